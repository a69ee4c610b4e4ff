//! Observable session state

use crate::models::{Session, User, UserMetadata};
use std::fmt;

/// Coarse label of the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// The startup session query has not resolved yet
    Initializing,
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Initializing => write!(f, "initializing"),
            AuthState::Unauthenticated => write!(f, "unauthenticated"),
            AuthState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Everything consumers may read about the session, published atomically
///
/// `revision` increases by one with every publish, so consumers can tell two
/// snapshots apart even when the coarse state is unchanged (token refresh,
/// profile update).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub user: Option<User>,
    pub loading: bool,
    pub revision: u64,
}

impl SessionSnapshot {
    /// The state before the startup query resolves
    #[must_use]
    pub fn initializing() -> Self {
        Self {
            session: None,
            user: None,
            loading: true,
            revision: 0,
        }
    }

    /// Resolved state carrying `session` (and its user)
    #[must_use]
    pub(crate) fn resolved(session: Option<Session>, revision: u64) -> Self {
        let user = session.as_ref().map(|s| s.user.clone());
        Self {
            session,
            user,
            loading: false,
            revision,
        }
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        if self.loading {
            AuthState::Initializing
        } else if self.session.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    /// Profile metadata of the signed-in user
    #[must_use]
    pub fn profile(&self) -> Option<&UserMetadata> {
        self.user.as_ref().map(|u| &u.user_metadata)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.email.as_deref())
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initializing()
    }
}
