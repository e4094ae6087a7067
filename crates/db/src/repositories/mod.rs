//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Methods that touch more than one
//! table open their own transaction.

pub mod ad_analytics_repo;
pub mod ad_config_repo;
pub mod refresh_token_repo;
pub mod session_repo;
pub mod user_repo;

pub use ad_analytics_repo::AdAnalyticsRepo;
pub use ad_config_repo::AdConfigRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
