//! Row types for every table, one module per table.
//!
//! Enum-valued columns are stored as upper-case TEXT and read back through
//! the core enums' `FromStr`; a value outside the enum is reported as
//! [`StoreError::Corrupt`].

use std::str::FromStr;

use adpass_core::store::StoreError;

pub mod ad_analytics;
pub mod ad_config;
pub mod refresh_token;
pub mod session;
pub mod user;

pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}
