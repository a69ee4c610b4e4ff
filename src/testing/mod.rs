//! Testing utilities for the session client
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built test data (users, sessions, settings)
//! - [`mock`] - In-memory auth backend
//!
//! ## Usage
//!
//! ```rust
//! use launchhub::testing::{fixtures::TestFixtures, mock::MockAuthBackend};
//! use launchhub::session::SessionManager;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
//! let manager = SessionManager::start(backend);
//! assert!(manager.ready().await.is_authenticated());
//! # }
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::MockAuthBackend;

/// Common test constants
pub mod constants {
    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test password
    pub const TEST_PASSWORD: &str = "secret123";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Test User";

    /// Default test college
    pub const TEST_COLLEGE: &str = "Test College";

    /// Default test user id
    pub const TEST_USER_ID: &str = "00000000-0000-4000-8000-000000000001";

    /// One-time code the mock backend accepts
    pub const TEST_OTP_CODE: &str = "123456";

    pub const TEST_ACCESS_TOKEN: &str = "test_access_token";

    pub const TEST_REFRESH_TOKEN: &str = "test_refresh_token";
}
