//! Domain core for adpass.
//!
//! - [`auth`] -- credential issuance, refresh-token rotation and theft detection.
//! - [`entitlement`] -- subscription-state gate deciding who sees ads.
//! - [`ads`] -- ad placement selection and analytics recording.
//! - [`store`] -- the persistence traits every component is constructed with.
//! - [`memory`] -- an in-process [`store`] implementation for tests and local runs.

pub mod ads;
pub mod auth;
pub mod entitlement;
pub mod error;
pub mod hashing;
pub mod memory;
pub mod roles;
pub mod store;
pub mod types;
