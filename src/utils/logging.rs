// Centralized logging for session state changes; tokens are never logged
use crate::models::{AuthChangeEvent, AuthError, AuthErrorKind, Session};
use crate::session::AuthState;
use log::{debug, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a published snapshot, at info level only when the auth state moves
    pub fn log_transition(previous: AuthState, current: AuthState, revision: u64) {
        if previous == current {
            debug!("Session snapshot r{revision} published ({current})");
        } else {
            info!("🔁 Auth state {previous} → {current} (r{revision})");
        }
    }

    pub fn log_profile_applied(user_id: &str, revision: u64) {
        info!("👤 Profile updated for user {user_id} (r{revision})");
    }

    /// Log the outcome of the startup session query
    pub fn log_initial_session(session: Option<&Session>) {
        match session {
            Some(session) => info!(
                "✅ Restored session for user {} (expires at {:?})",
                session.user.id,
                session.expires_at()
            ),
            None => info!("🔓 No stored session, showing sign-in"),
        }
    }

    pub fn log_initial_session_failed(error: &AuthError) {
        warn!("⚠️  Startup session query failed, treating as signed out: {error}");
    }

    /// Log a pushed session change
    pub fn log_auth_event(event: AuthChangeEvent, session: Option<&Session>) {
        match session {
            Some(session) => info!("📣 {event} for user {}", session.user.id),
            None => info!("📣 {event}"),
        }
    }

    /// Log a failed action; rejected input is expected and stays at debug
    pub fn log_action_failed(action: &str, error: &AuthError) {
        match error.kind {
            AuthErrorKind::InputRejected => debug!(
                "{action} rejected: {error} (code: {:?}, status: {:?})",
                error.code, error.status
            ),
            AuthErrorKind::Transport => warn!("⚠️  {action} failed to reach the backend: {error}"),
            AuthErrorKind::Internal => warn!("❌ {action} failed: {error}"),
        }
    }
}
