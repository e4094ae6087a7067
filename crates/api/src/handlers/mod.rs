//! Request handlers, grouped by resource.

pub mod ads;
pub mod auth;

use adpass_core::error::CoreError;
use validator::Validate;

use crate::error::AppError;

/// Run `validator` rules on a request body, mapping failures to 400.
pub(crate) fn validate_body<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))
}
