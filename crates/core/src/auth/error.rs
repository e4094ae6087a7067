use crate::store::StoreError;

/// Failures of the credential issuer and rotation protocol.
///
/// The HTTP layer collapses [`InvalidRefreshToken`](Self::InvalidRefreshToken)
/// and [`RefreshTokenReused`](Self::RefreshTokenReused) into one response so a
/// replaying client cannot tell which happened.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired access token")]
    InvalidAccessToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /// A spent refresh token was presented again; every session of the user
    /// has been revoked.
    #[error("Refresh token reused")]
    RefreshTokenReused,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Token minting failed: {0}")]
    TokenMinting(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}
