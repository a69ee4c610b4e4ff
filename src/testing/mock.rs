//! In-memory auth backend for isolated testing
//!
//! `MockAuthBackend` behaves like the hosted service for the flows the app
//! uses: accounts with passwords, e-mailed one-time codes, sessions, merged
//! profile metadata and pushed session changes. Test hooks let a test hold
//! or fail the startup query, inject errors, and push external changes.

use crate::backend::{AuthBackend, AuthEventBus, AuthSubscription};
use crate::models::{
    AuthChangeEvent, AuthData, AuthError, AuthResult, AuthStateChange, OtpRequest,
    PasswordCredentials, ProfileUpdate, Session, SignUpRequest, User, VerifyOtpRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::constants::TEST_OTP_CODE;

const MIN_PASSWORD_LENGTH: usize = 6;

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    pending_codes: HashMap<String, String>,
    initial_error: Option<AuthError>,
    next_error: Option<AuthError>,
    otp_requests: Vec<OtpRequest>,
    sign_up_requests: Vec<SignUpRequest>,
    confirm_sign_ups: bool,
}

/// In-memory stand-in for the hosted auth service
pub struct MockAuthBackend {
    state: Mutex<MockState>,
    events: AuthEventBus,
    initial_gate: watch::Sender<bool>,
    call_gate: watch::Sender<bool>,
    hold_next: AtomicBool,
    parked_calls: AtomicUsize,
    silent: AtomicBool,
    panic_next: AtomicBool,
    token_counter: AtomicUsize,
}

impl Default for MockAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthBackend {
    /// Backend with no accounts and no session
    #[must_use]
    pub fn new() -> Self {
        let (initial_gate, _) = watch::channel(true);
        let (call_gate, _) = watch::channel(true);
        Self {
            state: Mutex::new(MockState {
                confirm_sign_ups: true,
                ..MockState::default()
            }),
            events: AuthEventBus::new(),
            initial_gate,
            call_gate,
            hold_next: AtomicBool::new(false),
            parked_calls: AtomicUsize::new(0),
            silent: AtomicBool::new(false),
            panic_next: AtomicBool::new(false),
            token_counter: AtomicUsize::new(0),
        }
    }

    /// Backend that restores `session` on startup
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        let backend = Self::new();
        backend.add_user(session.user.clone(), super::constants::TEST_PASSWORD);
        backend.lock().session = Some(session);
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Test hooks
    // -------------------------------------------------------------------------

    /// Register an account
    pub fn add_user(&self, user: User, password: &str) {
        let email = user.email.clone().unwrap_or_default();
        self.lock().accounts.insert(
            email,
            Account {
                password: password.to_string(),
                user,
            },
        );
    }

    /// Make `get_session` wait until [`Self::release_initial_session`]
    pub fn hold_initial_session(&self) {
        self.initial_gate.send_replace(false);
    }

    pub fn release_initial_session(&self) {
        self.initial_gate.send_replace(true);
    }

    /// Make the startup query fail with `error`
    pub fn fail_initial_session(&self, error: AuthError) {
        self.lock().initial_error = Some(error);
    }

    /// Make the next action fail with `error`
    pub fn fail_next_call(&self, error: AuthError) {
        self.lock().next_error = Some(error);
    }

    /// Park the next action until [`Self::release_held_calls`]
    ///
    /// Later actions are not affected.
    pub fn hold_next_call(&self) {
        self.call_gate.send_replace(false);
        self.hold_next.store(true, Ordering::SeqCst);
    }

    pub fn release_held_calls(&self) {
        self.call_gate.send_replace(true);
    }

    /// Number of actions currently parked by [`Self::hold_next_call`]
    #[must_use]
    pub fn parked_calls(&self) -> usize {
        self.parked_calls.load(Ordering::SeqCst)
    }

    /// Make the next action panic
    pub fn panic_on_next_call(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Stop pushing changes caused by actions (external pushes still go out)
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    /// Whether sign-up returns a session immediately (`true`) or waits for
    /// e-mail confirmation (`false`)
    pub fn set_confirm_sign_ups(&self, confirm: bool) {
        self.lock().confirm_sign_ups = confirm;
    }

    /// Push a change without touching server-side state
    pub fn push(&self, change: AuthStateChange) {
        self.events.publish(&change);
    }

    /// Revoke the current session server-side and push the sign-out
    pub fn revoke_session(&self) {
        self.lock().session = None;
        self.push(AuthStateChange::signed_out());
    }

    /// Issue a fresh token pair for the current session and push the refresh
    pub fn refresh_tokens(&self) -> Option<Session> {
        let session = self.lock().session.clone()?;
        let refreshed = self.issue_session(session.user);
        self.lock().session = Some(refreshed.clone());
        self.push(AuthStateChange::new(
            AuthChangeEvent::TokenRefreshed,
            Some(refreshed.clone()),
        ));
        Some(refreshed)
    }

    /// Code the last OTP request for `email` produced
    #[must_use]
    pub fn pending_code(&self, email: &str) -> Option<String> {
        self.lock().pending_codes.get(email).cloned()
    }

    #[must_use]
    pub fn otp_requests(&self) -> Vec<OtpRequest> {
        self.lock().otp_requests.clone()
    }

    #[must_use]
    pub fn sign_up_requests(&self) -> Vec<SignUpRequest> {
        self.lock().sign_up_requests.clone()
    }

    /// Server-side copy of the user registered under `email`
    #[must_use]
    pub fn stored_user(&self, email: &str) -> Option<User> {
        self.lock().accounts.get(email).map(|a| a.user.clone())
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Apply any hold, panic or failure injected for the next action
    async fn before_call(&self) -> AuthResult<()> {
        if self.hold_next.swap(false, Ordering::SeqCst) {
            let mut gate = self.call_gate.subscribe();
            self.parked_calls.fetch_add(1, Ordering::SeqCst);
            let _ = gate.wait_for(|open| *open).await;
            self.parked_calls.fetch_sub(1, Ordering::SeqCst);
        }
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("injected backend panic");
        }
        match self.lock().next_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn issue_session(&self, user: User) -> Session {
        let n = self.token_counter.fetch_add(1, Ordering::SeqCst);
        Session::new(
            &format!("mock_access_{n}"),
            &format!("mock_refresh_{n}"),
            3600,
            user,
        )
    }

    fn start_session(&self, mut user: User) -> Session {
        user.last_sign_in_at = Some(Utc::now());
        let session = self.issue_session(user);
        self.lock().session = Some(session.clone());
        self.announce(AuthStateChange::signed_in(session.clone()));
        session
    }

    fn announce(&self, change: AuthStateChange) {
        if !self.silent.load(Ordering::SeqCst) {
            self.events.publish(&change);
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        let mut gate = self.initial_gate.subscribe();
        // The sender lives as long as `self`, so this only waits for release
        let _ = gate.wait_for(|open| *open).await;

        let mut state = self.lock();
        match state.initial_error.take() {
            Some(error) => Err(error),
            None => Ok(state.session.clone()),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_otp(&self, request: OtpRequest) -> AuthResult<AuthData> {
        self.before_call().await?;
        let mut state = self.lock();
        if !state.accounts.contains_key(&request.email) {
            if !request.create_user {
                return Err(AuthError::rejected("Signups not allowed for otp")
                    .with_code("otp_disabled")
                    .with_status(422));
            }
            let user = User::new(&uuid::Uuid::new_v4().to_string(), &request.email);
            state.accounts.insert(
                request.email.clone(),
                Account {
                    password: String::new(),
                    user,
                },
            );
        }
        state
            .pending_codes
            .insert(request.email.clone(), TEST_OTP_CODE.to_string());
        state.otp_requests.push(request);
        Ok(AuthData::empty())
    }

    async fn sign_in_with_password(
        &self,
        credentials: PasswordCredentials,
    ) -> AuthResult<AuthData> {
        self.before_call().await?;
        let user = {
            let state = self.lock();
            match state.accounts.get(&credentials.email) {
                Some(account)
                    if !account.password.is_empty() && account.password == credentials.password =>
                {
                    account.user.clone()
                }
                _ => {
                    return Err(AuthError::rejected("Invalid login credentials")
                        .with_code("invalid_credentials")
                        .with_status(400))
                }
            }
        };
        Ok(AuthData::from_session(self.start_session(user)))
    }

    async fn sign_up(&self, request: SignUpRequest) -> AuthResult<AuthData> {
        self.before_call().await?;
        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err(
                AuthError::rejected("Password should be at least 6 characters.")
                    .with_code("weak_password")
                    .with_status(422),
            );
        }

        let (user, confirm) = {
            let mut state = self.lock();
            state.sign_up_requests.push(request.clone());
            if state.accounts.contains_key(&request.email) {
                return Err(AuthError::rejected("User already registered")
                    .with_code("user_already_exists")
                    .with_status(422));
            }
            let mut user = User::new(&uuid::Uuid::new_v4().to_string(), &request.email)
                .with_metadata(request.data.clone());
            user.created_at = Some(Utc::now());
            state.accounts.insert(
                request.email.clone(),
                Account {
                    password: request.password.clone(),
                    user: user.clone(),
                },
            );
            (user, state.confirm_sign_ups)
        };

        if confirm {
            Ok(AuthData::from_session(self.start_session(user)))
        } else {
            Ok(AuthData::from_user(user))
        }
    }

    async fn verify_otp(&self, request: VerifyOtpRequest) -> AuthResult<AuthData> {
        self.before_call().await?;
        let user = {
            let mut state = self.lock();
            let valid = state
                .pending_codes
                .get(&request.email)
                .is_some_and(|code| *code == request.token);
            if !valid {
                return Err(AuthError::rejected("Token has expired or is invalid")
                    .with_code("otp_expired")
                    .with_status(403));
            }
            state.pending_codes.remove(&request.email);
            let account = state.accounts.get_mut(&request.email).ok_or_else(|| {
                AuthError::rejected("User not found").with_code("user_not_found")
            })?;
            account.user.email_confirmed_at = Some(Utc::now());
            account.user.clone()
        };
        Ok(AuthData::from_session(self.start_session(user)))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.before_call().await?;
        self.lock().session = None;
        self.announce(AuthStateChange::signed_out());
        Ok(())
    }

    async fn update_user(&self, update: ProfileUpdate) -> AuthResult<User> {
        self.before_call().await?;
        let session = {
            let mut state = self.lock();
            let Some(mut session) = state.session.clone() else {
                return Err(AuthError::rejected("Auth session missing!")
                    .with_code("session_not_found")
                    .with_status(401));
            };
            let email = session.user.email.clone().unwrap_or_default();
            let account = state.accounts.get_mut(&email).ok_or_else(|| {
                AuthError::rejected("User not found").with_code("user_not_found")
            })?;
            account.user.user_metadata.merge(&update);
            session.user = account.user.clone();
            state.session = Some(session.clone());
            session
        };

        let user = session.user.clone();
        self.announce(AuthStateChange::new(
            AuthChangeEvent::UserUpdated,
            Some(session),
        ));
        Ok(user)
    }
}
