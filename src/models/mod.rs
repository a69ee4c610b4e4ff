use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub mod auth;
pub mod profile;

pub use auth::{
    AuthChangeEvent, AuthData, AuthError, AuthErrorKind, AuthResult, AuthStateChange,
    OtpRequest, OtpType, PasswordCredentials, SignUpRequest, VerifyOtpRequest,
};
pub use profile::{ProfileUpdate, SocialLinks, UserMetadata};

/// The authenticated identity as reported by the auth backend
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user with empty metadata
    #[must_use]
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: UserMetadata::default(),
            created_at: None,
            email_confirmed_at: None,
            last_sign_in_at: None,
        }
    }

    /// Attach profile metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: UserMetadata) -> Self {
        self.user_metadata = metadata;
        self
    }

    /// Whether the backend has confirmed the user's e-mail address
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Token bundle issued by the auth backend
///
/// The tokens are opaque to this crate. Only `expires_at` is interpreted, and
/// it falls back to the `exp` claim of the access token when the backend
/// omits it.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// Tokens stay out of debug output
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session for `user` expiring `expires_in` seconds from now
    #[must_use]
    pub fn new(access_token: &str, refresh_token: &str, expires_in: i64, user: User) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: default_token_type(),
            expires_in: Some(expires_in),
            expires_at: Some(Utc::now().timestamp() + expires_in),
            user,
        }
    }

    /// Fill in `expires_at` from `expires_in` or the token's `exp` claim
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs)
                .or_else(|| access_token_expiry(&self.access_token));
        }
        self
    }

    /// Expiry instant, if known
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .or_else(|| access_token_expiry(&self.access_token))
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// Whether the session expires within `margin` of `now`
    ///
    /// Sessions with unknown expiry are treated as valid.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| expires_at - margin <= now)
    }
}

/// Read the `exp` claim from a JWT without verifying it
fn access_token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp")?.as_i64()
}
