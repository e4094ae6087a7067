//! HTTP-side authentication helpers.
//!
//! Token minting and session binding live in `adpass_core::auth`; this module
//! only adds password handling for the login and registration handlers.

pub mod password;
