//! Session Manager - single source of truth for "who is signed in"
//!
//! The `SessionManager` owns the `{session, user, loading}` snapshot, mediates
//! every auth action, and turns the backend's pushed session changes into
//! snapshot updates that all consumers observe atomically.
//!
//! ## Lifecycle
//!
//! 1. **Start** - subscribe to pushed changes, then query the current session
//! 2. **Initializing** - pushed changes are buffered until the query resolves
//! 3. **Resolved** - the newest buffered change wins over the query result;
//!    afterwards changes are applied in arrival order
//! 4. **Shutdown** - the subscription is released exactly once and nothing is
//!    published afterwards
//!
//! Actions never move the state themselves: sign-in, verification and
//! sign-out take effect when the backend pushes the resulting change. The one
//! exception is `update_profile`, which publishes the returned user directly.

use crate::backend::{AuthBackend, AuthSubscription};
use crate::models::{
    AuthData, AuthError, AuthResult, AuthStateChange, OtpRequest, OtpType, PasswordCredentials,
    ProfileUpdate, Session, SignUpRequest, User, UserMetadata, VerifyOtpRequest,
};
use crate::session::navigation::RootRoute;
use crate::session::state::{AuthState, SessionSnapshot};
use crate::settings::LaunchhubSettings;
use crate::utils::logging::LoggingHelper;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

// =============================================================================
// Configuration
// =============================================================================

/// Options applied to the backend calls the manager makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionManagerConfig {
    /// Deep link embedded in sign-up and one-time-code e-mails
    pub redirect_url: Option<String>,
    /// Whether requesting a one-time code may create the account
    pub otp_creates_user: bool,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            redirect_url: Some(crate::settings::DEFAULT_REDIRECT_URL.to_string()),
            otp_creates_user: true,
        }
    }
}

impl SessionManagerConfig {
    #[must_use]
    pub fn from_settings(settings: &LaunchhubSettings) -> Self {
        let redirect_url = Some(settings.auth.redirect_url.clone()).filter(|url| !url.is_empty());
        Self {
            redirect_url,
            ..Self::default()
        }
    }
}

// =============================================================================
// Snapshot cell
// =============================================================================

/// The published snapshot plus the teardown flag, shared with the driver task
struct StateCell {
    sender: watch::Sender<SessionSnapshot>,
    closed: AtomicBool,
}

impl StateCell {
    fn new() -> Self {
        let (sender, _) = watch::channel(SessionSnapshot::initializing());
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    /// Mark closed while holding the snapshot lock so no publish can interleave
    ///
    /// Receivers are woken with the snapshot left as it was, so anyone parked
    /// in [`SessionManager::ready`] sees the closure.
    fn close(&self) {
        self.sender.send_if_modified(|_| {
            !self.closed.swap(true, Ordering::SeqCst)
        });
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Replace session and user together and leave the initializing state
    fn publish_session(&self, session: Option<Session>) -> bool {
        self.sender.send_if_modified(|snapshot| {
            if self.closed.load(Ordering::SeqCst) {
                return false;
            }
            let previous = snapshot.state();
            *snapshot = SessionSnapshot::resolved(session, snapshot.revision + 1);
            LoggingHelper::log_transition(previous, snapshot.state(), snapshot.revision);
            true
        })
    }

    /// Swap in a fresher copy of the signed-in user
    ///
    /// Ignored unless the same user is still signed in, so a late response
    /// can never resurrect a user next to a cleared session.
    fn publish_user(&self, user: &User) -> bool {
        self.sender.send_if_modified(|snapshot| {
            if self.closed.load(Ordering::SeqCst) {
                return false;
            }
            let Some(session) = snapshot.session.as_mut() else {
                return false;
            };
            if session.user.id != user.id {
                return false;
            }
            session.user = user.clone();
            snapshot.user = Some(user.clone());
            snapshot.revision += 1;
            LoggingHelper::log_profile_applied(&user.id, snapshot.revision);
            true
        })
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.sender.borrow().clone()
    }
}

// =============================================================================
// Session Manager Structure
// =============================================================================

struct Inner {
    backend: Arc<dyn AuthBackend>,
    cell: Arc<StateCell>,
    config: SessionManagerConfig,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cell.close();
        // Dropping the sender wakes the driver, which then unsubscribes
        self.shutdown
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Owner of the session snapshot and mediator of all auth actions
///
/// Cloning is cheap; all clones share one snapshot. The manager tears down
/// when [`SessionManager::shutdown`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

// =============================================================================
// 1. Construction
// =============================================================================

impl SessionManager {
    /// Start a manager over `backend` with default options
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn start(backend: Arc<dyn AuthBackend>) -> Self {
        Self::start_with_config(backend, SessionManagerConfig::default())
    }

    /// Start a manager over `backend`
    ///
    /// Subscribes to pushed changes before issuing the startup query so no
    /// change can slip between the two.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn start_with_config(backend: Arc<dyn AuthBackend>, config: SessionManagerConfig) -> Self {
        let cell = Arc::new(StateCell::new());
        let subscription = backend.on_auth_state_change();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let initial = tokio::spawn({
            let backend = Arc::clone(&backend);
            async move { backend.get_session().await }
        });
        let driver = tokio::spawn(drive(
            Arc::clone(&cell),
            subscription,
            initial,
            shutdown_rx,
        ));
        log::info!("🔐 Session manager started");

        Self {
            inner: Arc::new(Inner {
                backend,
                cell,
                config,
                shutdown: Mutex::new(Some(shutdown_tx)),
                driver: Mutex::new(Some(driver)),
            }),
        }
    }
}

/// Apply the startup query and pushed changes to the snapshot
async fn drive(
    cell: Arc<StateCell>,
    mut subscription: AuthSubscription,
    mut initial: JoinHandle<AuthResult<Option<Session>>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut initial_done = false;
    let mut events_open = true;
    // Latest change pushed while the startup query was still in flight
    let mut pending: Option<AuthStateChange> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            // Changes queued before the query resolved must be buffered first
            change = subscription.recv(), if events_open => match change {
                Some(change) if !initial_done => {
                    log::debug!("Buffering {} until the startup query resolves", change.event);
                    pending = Some(change);
                }
                Some(change) => {
                    LoggingHelper::log_auth_event(change.event, change.session.as_ref());
                    cell.publish_session(change.session);
                }
                None => {
                    log::debug!("Auth event stream closed");
                    events_open = false;
                }
            },
            joined = &mut initial, if !initial_done => {
                initial_done = true;
                let restored = match joined {
                    Ok(Ok(session)) => session,
                    Ok(Err(e)) => {
                        LoggingHelper::log_initial_session_failed(&e);
                        None
                    }
                    Err(e) => {
                        log::error!("Startup session query aborted: {e}");
                        None
                    }
                };
                match pending.take() {
                    Some(change) => {
                        log::debug!("Applying {} pushed during startup", change.event);
                        cell.publish_session(change.session);
                    }
                    None => {
                        LoggingHelper::log_initial_session(restored.as_ref());
                        cell.publish_session(restored);
                    }
                }
            }
        }
    }

    if !initial_done {
        initial.abort();
    }
    subscription.unsubscribe();
    log::info!("🔒 Session manager stopped");
}

/// Run a backend call on its own task so a panic becomes an error and an
/// abandoned caller cannot cancel it halfway
async fn guarded<T, F>(action: &'static str, call: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: Future<Output = AuthResult<T>> + Send + 'static,
{
    let result = match tokio::spawn(call).await {
        Ok(result) => result,
        Err(e) => {
            log::error!("{action} aborted unexpectedly: {e}");
            Err(AuthError::internal("Something went wrong. Please try again."))
        }
    };
    if let Err(e) = &result {
        LoggingHelper::log_action_failed(action, e);
    }
    result
}

// =============================================================================
// 2. Snapshot Access
// =============================================================================

impl SessionManager {
    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.cell.snapshot()
    }

    /// Read-only view that is notified on every published snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.cell.sender.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.cell.sender.borrow().state()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.cell.sender.borrow().loading
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.cell.sender.borrow().session.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.cell.sender.borrow().user.clone()
    }

    /// Navigator the root should show for the current snapshot
    #[must_use]
    pub fn route(&self) -> RootRoute {
        RootRoute::from_snapshot(&self.inner.cell.sender.borrow())
    }

    /// Wait until the startup query has resolved or the manager has shut down
    ///
    /// After a shutdown during initialization the returned snapshot is still
    /// `loading`.
    pub async fn ready(&self) -> SessionSnapshot {
        let cell = Arc::clone(&self.inner.cell);
        let mut receiver = self.subscribe();
        let resolved = match receiver
            .wait_for(|snapshot| !snapshot.loading || cell.is_closed())
            .await
        {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        resolved
    }

    #[must_use]
    pub fn config(&self) -> &SessionManagerConfig {
        &self.inner.config
    }
}

// =============================================================================
// 3. Auth Actions
// =============================================================================

impl SessionManager {
    fn backend(&self) -> AuthResult<Arc<dyn AuthBackend>> {
        if self.inner.cell.is_closed() {
            return Err(AuthError::internal("Session manager has shut down"));
        }
        Ok(Arc::clone(&self.inner.backend))
    }

    /// E-mail a one-time code; no state change until it is verified
    ///
    /// # Errors
    /// Returns the backend's error if the code could not be sent
    pub async fn sign_in_with_otp(&self, email: &str) -> AuthResult<AuthData> {
        let backend = self.backend()?;
        let request = OtpRequest {
            email: email.to_string(),
            redirect_to: self.inner.config.redirect_url.clone(),
            create_user: self.inner.config.otp_creates_user,
        };
        guarded("sign_in_with_otp", async move {
            backend.sign_in_with_otp(request).await
        })
        .await
    }

    /// Sign in with e-mail and password
    ///
    /// # Errors
    /// Returns the backend's error if the credentials are rejected
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthData> {
        let backend = self.backend()?;
        let credentials = PasswordCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        guarded("sign_in_with_password", async move {
            backend.sign_in_with_password(credentials).await
        })
        .await
    }

    /// Create an account whose metadata starts as `profile`
    ///
    /// # Errors
    /// Returns the backend's error if the account cannot be created
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: UserMetadata,
    ) -> AuthResult<AuthData> {
        let backend = self.backend()?;
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            data: profile,
            redirect_to: self.inner.config.redirect_url.clone(),
        };
        guarded("sign_up", async move { backend.sign_up(request).await }).await
    }

    /// Verify the one-time code e-mailed to `email`
    ///
    /// # Errors
    /// Returns the backend's error if the code is invalid or expired
    pub async fn verify_otp(&self, email: &str, code: &str) -> AuthResult<AuthData> {
        let backend = self.backend()?;
        let request = VerifyOtpRequest {
            email: email.to_string(),
            token: code.to_string(),
            otp_type: OtpType::Email,
        };
        guarded("verify_otp", async move { backend.verify_otp(request).await }).await
    }

    /// Sign out of the current session
    ///
    /// # Errors
    /// Returns the backend's error if the session could not be invalidated
    pub async fn sign_out(&self) -> AuthResult<()> {
        let backend = self.backend()?;
        guarded("sign_out", async move { backend.sign_out().await }).await
    }

    /// Merge `update` into the signed-in user's profile
    ///
    /// On success the snapshot's user is replaced with the backend's copy.
    ///
    /// # Errors
    /// Returns the backend's error if there is no session or the update is rejected
    pub async fn update_profile(&self, update: ProfileUpdate) -> AuthResult<User> {
        let backend = self.backend()?;
        let cell = Arc::clone(&self.inner.cell);
        guarded("update_profile", async move {
            let user = backend.update_user(update).await?;
            cell.publish_user(&user);
            Ok(user)
        })
        .await
    }
}

// =============================================================================
// 4. Teardown
// =============================================================================

impl SessionManager {
    /// Release the push subscription and stop publishing
    ///
    /// Safe to call any number of times from any clone; only the first call
    /// does anything.
    pub async fn shutdown(&self) {
        self.inner.cell.close();

        let sender = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The driver may already be gone
            let _ = sender.send(());
        }

        let driver = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                log::warn!("⚠️  Session driver ended abnormally: {e}");
            }
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.cell.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockAuthBackend;
    use crate::testing::fixtures::TestFixtures;
    use std::time::Duration;

    #[tokio::test]
    async fn test_starts_initializing() {
        let backend = Arc::new(MockAuthBackend::new());
        backend.hold_initial_session();
        let manager = SessionManager::start(backend.clone());

        let snapshot = manager.snapshot();
        assert!(snapshot.loading);
        assert!(snapshot.session.is_none());
        assert_eq!(manager.route(), RootRoute::Loading);

        backend.release_initial_session();
        let ready = manager.ready().await;
        assert!(!ready.loading);
        assert_eq!(ready.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_failed_startup_query_still_resolves_loading() {
        let backend = Arc::new(MockAuthBackend::new());
        backend.fail_initial_session(AuthError::transport("offline"));
        let manager = SessionManager::start(backend);

        let ready = manager.ready().await;
        assert!(!ready.loading);
        assert!(ready.session.is_none());
    }

    #[tokio::test]
    async fn test_update_profile_ignored_after_sign_out() {
        let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
        let manager = SessionManager::start(backend.clone());
        manager.ready().await;

        let cell = Arc::clone(&manager.inner.cell);
        manager.sign_out().await.unwrap();
        let mut receiver = manager.subscribe();
        receiver
            .wait_for(|s| s.session.is_none())
            .await
            .unwrap();

        // A late profile response for the departed user changes nothing
        assert!(!cell.publish_user(&TestFixtures::user()));
        assert!(manager.user().is_none());
    }

    #[tokio::test]
    async fn test_actions_rejected_after_shutdown() {
        let manager = SessionManager::start(Arc::new(MockAuthBackend::new()));
        manager.shutdown().await;
        manager.shutdown().await;

        let error = manager.sign_out().await.unwrap_err();
        assert_eq!(error.kind, crate::models::AuthErrorKind::Internal);
        assert!(manager.is_shut_down());
    }

    #[tokio::test]
    async fn test_panicking_backend_becomes_error() {
        let backend = Arc::new(MockAuthBackend::new());
        backend.panic_on_next_call();
        let manager = SessionManager::start(backend);
        manager.ready().await;

        let error = tokio::time::timeout(
            Duration::from_secs(5),
            manager.sign_in_with_password("a@b.co", "secret1"),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert_eq!(error.kind, crate::models::AuthErrorKind::Internal);
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = LaunchhubSettings::default();
        assert_eq!(
            SessionManagerConfig::from_settings(&settings).redirect_url.as_deref(),
            Some("prolaunchhub://")
        );

        settings.auth.redirect_url = String::new();
        assert_eq!(SessionManagerConfig::from_settings(&settings).redirect_url, None);
    }
}
