use launchhub::{
    models::{AuthChangeEvent, AuthError, AuthErrorKind, AuthStateChange, ProfileUpdate, User, UserMetadata},
    session::{AuthState, RootRoute, SessionManager, SessionManagerConfig, SessionSnapshot},
    testing::{constants, fixtures::TestFixtures, mock::MockAuthBackend},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Wait until the snapshot satisfies `predicate`
async fn wait_until(
    manager: &SessionManager,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut receiver = manager.subscribe();
    let snapshot = timeout(WAIT, receiver.wait_for(predicate))
        .await
        .expect("snapshot did not reach the expected state")
        .expect("manager dropped its snapshot")
        .clone();
    snapshot
}

fn registered_backend() -> Arc<MockAuthBackend> {
    let backend = MockAuthBackend::new();
    backend.add_user(TestFixtures::user(), constants::TEST_PASSWORD);
    Arc::new(backend)
}

async fn started(backend: &Arc<MockAuthBackend>) -> SessionManager {
    let manager = SessionManager::start(backend.clone());
    timeout(WAIT, manager.ready()).await.unwrap();
    manager
}

#[tokio::test]
async fn test_restored_session_resolves_without_flicker() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    backend.hold_initial_session();
    let manager = SessionManager::start(backend.clone());

    let initial = manager.snapshot();
    assert!(initial.loading);
    assert_eq!(initial.revision, 0);
    assert_eq!(manager.route(), RootRoute::Loading);

    backend.release_initial_session();
    let ready = timeout(WAIT, manager.ready()).await.unwrap();

    // The first publish lands directly on the restored session
    assert_eq!(ready.revision, 1);
    assert_eq!(ready.state(), AuthState::Authenticated);
    assert_eq!(ready.user.as_ref().map(|u| u.id.as_str()), Some(constants::TEST_USER_ID));
    assert_eq!(manager.route(), RootRoute::Main);
}

#[tokio::test]
async fn test_no_stored_session_shows_auth() {
    let backend = Arc::new(MockAuthBackend::new());
    let manager = started(&backend).await;

    assert_eq!(manager.state(), AuthState::Unauthenticated);
    assert!(!manager.is_loading());
    assert!(manager.session().is_none());
    assert!(manager.user().is_none());
    assert_eq!(manager.route().initial_screen(), Some("Login"));
}

#[tokio::test]
async fn test_password_sign_in_round_trip() {
    let backend = registered_backend();
    let manager = started(&backend).await;

    let data = manager
        .sign_in_with_password(constants::TEST_EMAIL, constants::TEST_PASSWORD)
        .await
        .unwrap();
    assert!(data.session.is_some());

    let snapshot = wait_until(&manager, |s| s.session.is_some()).await;
    assert_eq!(snapshot.email(), Some(constants::TEST_EMAIL));
    assert_eq!(
        snapshot.session.as_ref().map(|s| &s.user),
        snapshot.user.as_ref()
    );
    assert_eq!(manager.route(), RootRoute::Main);
}

#[tokio::test]
async fn test_rejected_credentials_leave_state_unchanged() {
    let backend = registered_backend();
    let manager = started(&backend).await;
    let before = manager.snapshot();

    let error = manager
        .sign_in_with_password(constants::TEST_EMAIL, "wrong-password")
        .await
        .unwrap_err();

    assert_eq!(error.kind, AuthErrorKind::InputRejected);
    assert_eq!(error.message, "Invalid login credentials");
    assert_eq!(error.code.as_deref(), Some("invalid_credentials"));
    assert_eq!(manager.snapshot(), before);
}

#[tokio::test]
async fn test_otp_flow_passes_redirect_and_signs_in() {
    let backend = Arc::new(MockAuthBackend::new());
    let manager = started(&backend).await;

    let data = manager.sign_in_with_otp(constants::TEST_EMAIL).await.unwrap();
    assert_eq!(data.session, None);
    assert_eq!(data.user, None);
    // Requesting a code changes nothing locally
    assert_eq!(manager.state(), AuthState::Unauthenticated);

    let requests = backend.otp_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].redirect_to.as_deref(), Some("prolaunchhub://"));
    assert!(requests[0].create_user);

    let error = manager
        .verify_otp(constants::TEST_EMAIL, "000000")
        .await
        .unwrap_err();
    assert_eq!(error.kind, AuthErrorKind::InputRejected);
    assert_eq!(manager.state(), AuthState::Unauthenticated);

    manager
        .verify_otp(constants::TEST_EMAIL, constants::TEST_OTP_CODE)
        .await
        .unwrap();
    let snapshot = wait_until(&manager, SessionSnapshot::is_authenticated).await;
    assert_eq!(snapshot.email(), Some(constants::TEST_EMAIL));
}

#[tokio::test]
async fn test_custom_redirect_url() {
    let backend = Arc::new(MockAuthBackend::new());
    backend.set_confirm_sign_ups(false);
    let config = SessionManagerConfig {
        redirect_url: Some("prolaunchhub://auth/callback".to_string()),
        otp_creates_user: false,
    };
    let manager = SessionManager::start_with_config(backend.clone(), config);
    manager.ready().await;

    let error = manager.sign_in_with_otp("new@example.com").await.unwrap_err();
    assert_eq!(error.code.as_deref(), Some("otp_disabled"));

    manager
        .sign_up(
            "new@example.com",
            constants::TEST_PASSWORD,
            UserMetadata::for_sign_up("New User", "X"),
        )
        .await
        .unwrap();
    let requests = backend.sign_up_requests();
    assert_eq!(
        requests[0].redirect_to.as_deref(),
        Some("prolaunchhub://auth/callback")
    );
}

#[tokio::test]
async fn test_sign_up_awaiting_confirmation_stays_signed_out() {
    let backend = Arc::new(MockAuthBackend::new());
    backend.set_confirm_sign_ups(false);
    let manager = started(&backend).await;

    let data = manager
        .sign_up(
            "new@example.com",
            constants::TEST_PASSWORD,
            UserMetadata::for_sign_up(" New User ", "Test College"),
        )
        .await
        .unwrap();

    assert!(data.needs_confirmation());
    let user = data.user.unwrap();
    assert_eq!(user.user_metadata.full_name.as_deref(), Some("New User"));
    assert_eq!(user.user_metadata.college.as_deref(), Some("Test College"));
    assert_eq!(manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_sign_up_errors() {
    let backend = registered_backend();
    let manager = started(&backend).await;

    let error = manager
        .sign_up("new@example.com", "abc", UserMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(error.code.as_deref(), Some("weak_password"));

    let error = manager
        .sign_up(constants::TEST_EMAIL, constants::TEST_PASSWORD, UserMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(error.message, "User already registered");
    assert_eq!(manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_sign_out_clears_session_and_user() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    let manager = started(&backend).await;
    assert!(manager.snapshot().is_authenticated());

    manager.sign_out().await.unwrap();
    let snapshot = wait_until(&manager, |s| s.session.is_none()).await;

    assert!(snapshot.user.is_none());
    assert!(!snapshot.loading);
    assert_eq!(manager.route(), RootRoute::Auth);
}

#[tokio::test]
async fn test_update_profile_merges_fields() {
    let user = User::new(constants::TEST_USER_ID, constants::TEST_EMAIL).with_metadata(
        UserMetadata {
            full_name: Some("Test User".to_string()),
            college: Some("X".to_string()),
            ..UserMetadata::default()
        },
    );
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session_for(
        user,
    )));
    let manager = started(&backend).await;

    let updated = manager
        .update_profile(ProfileUpdate::new().skills(["A", "B"]))
        .await
        .unwrap();

    assert_eq!(updated.user_metadata.college.as_deref(), Some("X"));
    assert_eq!(updated.user_metadata.skills(), ["A", "B"]);
    // Visible as soon as the call returns
    let current = manager.user().unwrap();
    assert_eq!(current, updated);
    assert_eq!(manager.session().unwrap().user, updated);
}

#[tokio::test]
async fn test_update_profile_without_session_fails() {
    let backend = Arc::new(MockAuthBackend::new());
    let manager = started(&backend).await;
    let before = manager.snapshot();

    let error = manager
        .update_profile(ProfileUpdate::new().bio("Hello"))
        .await
        .unwrap_err();

    assert_eq!(error.kind, AuthErrorKind::InputRejected);
    assert_eq!(manager.snapshot(), before);
}

#[tokio::test]
async fn test_transport_errors_pass_through() {
    let backend = registered_backend();
    let manager = started(&backend).await;

    backend.fail_next_call(AuthError::transport("Network request failed"));
    let error = manager
        .sign_in_with_password(constants::TEST_EMAIL, constants::TEST_PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(error.kind, AuthErrorKind::Transport);
    assert_eq!(error.to_string(), "Network request failed");
    assert_eq!(manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_push_during_startup_wins_over_query() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    backend.hold_initial_session();
    let manager = SessionManager::start(backend.clone());

    // The query will still report the stored session
    backend.push(AuthStateChange::signed_out());
    backend.release_initial_session();

    let ready = timeout(WAIT, manager.ready()).await.unwrap();
    assert_eq!(ready.state(), AuthState::Unauthenticated);
    assert_eq!(ready.revision, 1);
}

#[tokio::test]
async fn test_pushed_sign_in_during_startup() {
    let backend = Arc::new(MockAuthBackend::new());
    backend.hold_initial_session();
    let manager = SessionManager::start(backend.clone());

    backend.push(AuthStateChange::signed_in(TestFixtures::session()));
    backend.release_initial_session();

    let ready = timeout(WAIT, manager.ready()).await.unwrap();
    assert!(ready.is_authenticated());
}

#[tokio::test]
async fn test_external_expiry_and_refresh() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    let manager = started(&backend).await;

    let refreshed = backend.refresh_tokens().unwrap();
    let snapshot = wait_until(&manager, |s| {
        s.session.as_ref().map(|s| &s.access_token) == Some(&refreshed.access_token)
    })
    .await;
    assert_eq!(snapshot.user.as_ref().map(|u| u.id.as_str()), Some(constants::TEST_USER_ID));

    backend.revoke_session();
    wait_until(&manager, |s| s.session.is_none()).await;
    assert_eq!(manager.route(), RootRoute::Auth);
}

#[tokio::test]
async fn test_consumers_share_one_snapshot() {
    let backend = registered_backend();
    let manager = started(&backend).await;
    let other = manager.clone();
    let mut first = manager.subscribe();
    let mut second = other.subscribe();

    manager
        .sign_in_with_password(constants::TEST_EMAIL, constants::TEST_PASSWORD)
        .await
        .unwrap();

    let a = timeout(WAIT, first.wait_for(|s| s.session.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    let b = timeout(WAIT, second.wait_for(|s| s.session.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_shutdown_releases_subscription_once() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    let manager = started(&backend).await;
    assert_eq!(backend.listener_count(), 1);

    manager.shutdown().await;
    manager.shutdown().await;
    manager.clone().shutdown().await;
    assert_eq!(backend.listener_count(), 0);

    let frozen = manager.snapshot();
    backend.push(AuthStateChange::signed_out());
    backend.push(AuthStateChange::new(AuthChangeEvent::TokenRefreshed, Some(TestFixtures::session())));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.snapshot(), frozen);

    let error = manager.sign_out().await.unwrap_err();
    assert_eq!(error.kind, AuthErrorKind::Internal);
}

#[tokio::test]
async fn test_dropping_last_handle_unsubscribes() {
    let backend = Arc::new(MockAuthBackend::new());
    let manager = started(&backend).await;
    let clone = manager.clone();
    drop(manager);
    assert_eq!(backend.listener_count(), 1);
    drop(clone);

    timeout(WAIT, async {
        while backend.listener_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("driver never released its subscription");
}

#[tokio::test]
async fn test_shutdown_while_initializing() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    backend.hold_initial_session();
    let manager = SessionManager::start(backend.clone());

    manager.shutdown().await;
    backend.release_initial_session();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(manager.snapshot().loading);
    assert_eq!(backend.listener_count(), 0);
}

#[tokio::test]
async fn test_ready_returns_after_shutdown_while_initializing() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    backend.hold_initial_session();
    let manager = SessionManager::start(backend.clone());

    // One waiter parked before the shutdown, one arriving after it
    let parked = tokio::spawn({
        let manager = manager.clone();
        async move { manager.ready().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.shutdown().await;
    backend.release_initial_session();

    let early = timeout(WAIT, parked).await.unwrap().unwrap();
    let late = timeout(WAIT, manager.ready()).await.unwrap();
    assert!(early.loading);
    assert!(late.loading);
    assert_eq!(late.revision, 0);
    assert!(manager.is_shut_down());
}

#[tokio::test]
async fn test_stalled_action_does_not_block_others() {
    let backend = Arc::new(MockAuthBackend::with_session(TestFixtures::session()));
    let manager = started(&backend).await;

    backend.hold_next_call();
    let stalled = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager
                .sign_in_with_password(constants::TEST_EMAIL, constants::TEST_PASSWORD)
                .await
        }
    });
    timeout(WAIT, async {
        while backend.parked_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sign-in never reached the backend");

    // Other actions, reads and pushed changes still go through
    timeout(WAIT, manager.sign_out()).await.unwrap().unwrap();
    wait_until(&manager, |s| s.session.is_none()).await;
    assert_eq!(manager.route(), RootRoute::Auth);

    backend.push(AuthStateChange::signed_in(TestFixtures::session()));
    let snapshot = wait_until(&manager, SessionSnapshot::is_authenticated).await;
    assert_eq!(manager.snapshot(), snapshot);
    assert!(!stalled.is_finished());

    backend.release_held_calls();
    let data = timeout(WAIT, stalled).await.unwrap().unwrap().unwrap();
    assert!(data.session.is_some());
    assert_eq!(backend.parked_calls(), 0);
}
