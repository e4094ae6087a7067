//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Requires a valid access token bound to a live session.
//! - [`auth::OptionalAuthUser`] -- Same, but anonymous requests pass as `None`.
//! - [`rbac::RequireAdmin`] -- Requires the `ADMIN` role.

pub mod auth;
pub mod rbac;
