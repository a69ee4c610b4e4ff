//! Test fixtures providing pre-built test objects
//!
//! This module provides commonly used test data as static fixtures,
//! eliminating the need to recreate the same test objects in multiple test files.

use crate::models::{Session, SocialLinks, User, UserMetadata};
use crate::settings::LaunchhubSettings;
use chrono::{Duration, Utc};

use super::constants::{
    TEST_ACCESS_TOKEN, TEST_COLLEGE, TEST_EMAIL, TEST_REFRESH_TOKEN, TEST_USER_ID, TEST_USER_NAME,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Profile of the standard test user
    #[must_use]
    pub fn profile() -> UserMetadata {
        UserMetadata {
            full_name: Some(TEST_USER_NAME.to_string()),
            college: Some(TEST_COLLEGE.to_string()),
            skills: Some(vec!["Rust".to_string()]),
            ..UserMetadata::default()
        }
    }

    /// Profile with every typed field populated
    #[must_use]
    pub fn full_profile() -> UserMetadata {
        UserMetadata {
            bio: Some("Computer Science Student | Full Stack Developer".to_string()),
            social_links: Some(SocialLinks {
                github: Some("https://github.com/test".to_string()),
                linkedin: None,
                portfolio: Some("https://test.dev".to_string()),
            }),
            ..Self::profile()
        }
    }

    /// Standard test user
    #[must_use]
    pub fn user() -> User {
        let mut user = User::new(TEST_USER_ID, TEST_EMAIL).with_metadata(Self::profile());
        user.email_confirmed_at = Some(Utc::now() - Duration::days(1));
        user
    }

    /// Session for the standard test user, valid for an hour
    #[must_use]
    pub fn session() -> Session {
        Session::new(TEST_ACCESS_TOKEN, TEST_REFRESH_TOKEN, 3600, Self::user())
    }

    /// Session for `user`, valid for an hour
    #[must_use]
    pub fn session_for(user: User) -> Session {
        Session::new(TEST_ACCESS_TOKEN, TEST_REFRESH_TOKEN, 3600, user)
    }

    /// Session that expired a minute ago
    #[must_use]
    pub fn expired_session() -> Session {
        let mut session = Self::session();
        session.expires_at = Some((Utc::now() - Duration::minutes(1)).timestamp());
        session
    }

    /// Settings pointing at `backend_url`
    #[must_use]
    pub fn settings(backend_url: &str) -> LaunchhubSettings {
        let mut settings = LaunchhubSettings::default();
        settings.backend.url = backend_url.to_string();
        settings.backend.anon_key = "test-anon-key".to_string();
        settings.auth.auto_refresh_interval_seconds = 0;
        settings
    }
}
