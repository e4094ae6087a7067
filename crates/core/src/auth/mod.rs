//! Session lifecycle: credential issuance and refresh-token rotation.
//!
//! - [`credentials`] -- JWT access tokens and opaque refresh tokens.
//! - [`issuer`] -- [`CredentialIssuer`], which mints pairs and binds them to sessions.
//! - [`rotation`] -- [`RefreshRotation`], which exchanges refresh tokens and
//!   detects replay of spent ones.

pub mod credentials;
pub mod error;
pub mod issuer;
pub mod rotation;

pub use credentials::{Claims, JwtConfig};
pub use error::AuthError;
pub use issuer::{Authenticated, CredentialIssuer, IssuedCredentials};
pub use rotation::RefreshRotation;
