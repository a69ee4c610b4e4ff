//! Auth backend boundary
//!
//! This module defines the contract the session manager depends on and the
//! pieces a concrete backend client is built from.
//!
//! # Modules
//!
//! - [`events`] - Push channel for session changes
//! - [`storage`] - Session persistence across restarts
//! - [`gotrue`] - HTTP client for the hosted auth service

pub mod events;
pub mod gotrue;
pub mod storage;

pub use events::{AuthEventBus, AuthSubscription};
pub use gotrue::{AutoRefreshGuard, GoTrueClient};
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};

use crate::models::{
    AuthData, AuthResult, OtpRequest, PasswordCredentials, ProfileUpdate, Session, SignUpRequest,
    User, VerifyOtpRequest,
};
use async_trait::async_trait;

/// Hosted authentication service as seen by the session manager
///
/// Implementations own credential checks, code dispatch, token issuance and
/// session persistence. Every session change they cause must also be pushed
/// to subscribers obtained from [`AuthBackend::on_auth_state_change`].
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, restored from storage if one is still valid
    ///
    /// # Errors
    /// Returns an error if the stored session cannot be read or refreshed
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Subscribe to pushed session changes
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// Ask the backend to e-mail a one-time code
    ///
    /// # Errors
    /// Returns an error if the backend rejects the address or is unreachable
    async fn sign_in_with_otp(&self, request: OtpRequest) -> AuthResult<AuthData>;

    /// Exchange an e-mail and password for a session
    ///
    /// # Errors
    /// Returns an error if the credentials are rejected or the backend is unreachable
    async fn sign_in_with_password(&self, credentials: PasswordCredentials)
        -> AuthResult<AuthData>;

    /// Create an account with initial profile metadata
    ///
    /// # Errors
    /// Returns an error if the account exists, the password is too weak, or
    /// the backend is unreachable
    async fn sign_up(&self, request: SignUpRequest) -> AuthResult<AuthData>;

    /// Verify a one-time code and obtain a session
    ///
    /// # Errors
    /// Returns an error if the code is invalid or expired, or the backend is unreachable
    async fn verify_otp(&self, request: VerifyOtpRequest) -> AuthResult<AuthData>;

    /// Invalidate the current session
    ///
    /// # Errors
    /// Returns an error if the backend could not invalidate the session
    async fn sign_out(&self) -> AuthResult<()>;

    /// Merge `update` into the signed-in user's metadata
    ///
    /// # Errors
    /// Returns an error if there is no session or the backend rejects the update
    async fn update_user(&self, update: ProfileUpdate) -> AuthResult<User>;
}
