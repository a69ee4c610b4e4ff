//! Authentication request, response, event and error types
//!
//! Every auth action resolves to an [`AuthResult`]: either the action's data
//! or an [`AuthError`], never both and never neither.

use super::{Session, User, UserMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of an auth action
pub type AuthResult<T> = Result<T, AuthError>;

/// Coarse classification of an auth failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// The backend rejected the request (bad credentials, weak password, expired code, ...)
    InputRejected,
    /// Network unreachable, timeout or server failure
    Transport,
    /// Anything unexpected at the call site
    Internal,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::InputRejected => write!(f, "input rejected"),
            AuthErrorKind::Transport => write!(f, "transport"),
            AuthErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Error surfaced by an auth action
///
/// The message is shown to users verbatim, so it carries the backend's own
/// wording whenever one was returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl AuthError {
    #[must_use]
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            status: None,
        }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InputRejected, message)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Transport, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Internal, message)
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Build from an HTTP status and the backend's error message
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>, code: Option<String>) -> Self {
        let kind = if status >= 500 {
            AuthErrorKind::Transport
        } else {
            AuthErrorKind::InputRejected
        };
        Self {
            kind,
            message: message.into(),
            code,
            status: Some(status),
        }
    }

    /// Whether the backend considers the session unknown or already invalid
    #[must_use]
    pub fn is_session_missing(&self) -> bool {
        matches!(self.status, Some(401 | 403 | 404))
            || matches!(
                self.code.as_deref(),
                Some("session_not_found" | "bad_jwt" | "refresh_token_not_found")
            )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::internal(format!("Unexpected response from auth service: {err}"));
        }
        let error = Self::transport(format!("Network request failed: {err}"));
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

/// Data returned by sign-in, sign-up and verification actions
///
/// Sign-up returns a user without a session while e-mail confirmation is
/// pending; the OTP dispatch returns neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthData {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl AuthData {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_session(session: Session) -> Self {
        Self {
            user: Some(session.user.clone()),
            session: Some(session),
        }
    }

    #[must_use]
    pub fn from_user(user: User) -> Self {
        Self {
            user: Some(user),
            session: None,
        }
    }

    /// True when the account exists but still needs e-mail confirmation
    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        self.session.is_none() && self.user.is_some()
    }
}

/// Which kind of one-time code is being verified
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    #[default]
    Email,
    Signup,
    Magiclink,
    Recovery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtpRequest {
    pub email: String,
    pub redirect_to: Option<String>,
    pub create_user: bool,
}

#[derive(Clone, PartialEq)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub data: UserMetadata,
    pub redirect_to: Option<String>,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("data", &self.data)
            .field("redirect_to", &self.redirect_to)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub token: String,
    pub otp_type: OtpType,
}

/// Kinds of session change pushed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthChangeEvent::InitialSession => "INITIAL_SESSION",
            AuthChangeEvent::SignedIn => "SIGNED_IN",
            AuthChangeEvent::SignedOut => "SIGNED_OUT",
            AuthChangeEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthChangeEvent::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// A pushed session change: the event and the session it leaves behind
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    #[must_use]
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthChangeEvent::SignedIn, Some(session))
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::new(AuthChangeEvent::SignedOut, None)
    }
}
