//! HTTP client for the hosted auth service
//!
//! Speaks the GoTrue REST API (`/auth/v1/...`) that the app's backend exposes.
//! Sessions obtained here are written to a [`SessionStore`] and every change
//! is pushed on the client's [`AuthEventBus`].

use super::{AuthBackend, AuthEventBus, AuthSubscription, SessionStore, StoreError};
use crate::models::{
    AuthChangeEvent, AuthData, AuthError, AuthErrorKind, AuthResult, AuthStateChange, OtpRequest,
    PasswordCredentials, ProfileUpdate, Session, SignUpRequest, User, VerifyOtpRequest,
};
use crate::settings::LaunchhubSettings;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Error body shapes returned by the auth service
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    code: Option<Value>,
}

impl ErrorBody {
    fn into_auth_error(self, status: u16) -> AuthError {
        let code = self
            .error_code
            .or_else(|| self.code.as_ref().and_then(Value::as_str).map(ToString::to_string))
            .or_else(|| self.error_description.as_ref().and(self.error.clone()));
        let message = self
            .msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| format!("Auth request failed with status {status}"));
        AuthError::from_status(status, message, code)
    }
}

/// Client for the hosted auth REST API
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    store: Arc<dyn SessionStore>,
    events: AuthEventBus,
    refresh_margin: Duration,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl GoTrueClient {
    /// Create a client for the project at `project_url`
    ///
    /// # Errors
    /// Returns an error if `project_url` is not a valid base URL
    pub fn new(
        project_url: &str,
        anon_key: &str,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, url::ParseError> {
        let mut project = Url::parse(project_url)?;
        if !project.path().ends_with('/') {
            let path = format!("{}/", project.path());
            project.set_path(&path);
        }
        let base_url = project.join("auth/v1/")?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            anon_key: anon_key.to_string(),
            store,
            events: AuthEventBus::new(),
            refresh_margin: Duration::seconds(10),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Create a client from loaded settings
    ///
    /// # Errors
    /// Returns an error if the configured backend URL is invalid
    pub fn from_settings(
        settings: &LaunchhubSettings,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self::new(&settings.backend.url, &settings.backend.anon_key, store)?
            .with_refresh_margin(Duration::seconds(settings.auth.refresh_margin_seconds)))
    }

    /// Refresh sessions this long before they expire
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, ...)
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Bus on which session changes are published
    #[must_use]
    pub fn events(&self) -> &AuthEventBus {
        &self.events
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> AuthResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AuthError::internal(format!("Invalid auth endpoint {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
    }

    async fn send(&self, request: RequestBuilder) -> AuthResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ErrorBody>(&body)
            .unwrap_or_default()
            .into_auth_error(status.as_u16());
        log::debug!(
            "Auth request failed with {}: {} ({:?})",
            status,
            error.message,
            error.code
        );
        Err(error)
    }

    async fn send_for_session(&self, request: RequestBuilder) -> AuthResult<Session> {
        let session: Session = self.send(request).await?.json().await?;
        Ok(session.normalized())
    }

    /// Persist `session` and announce it
    fn install(&self, session: Session, event: AuthChangeEvent) -> AuthResult<Session> {
        self.store
            .save(&session)
            .map_err(|e| AuthError::internal(e.to_string()))?;
        self.events
            .publish(&AuthStateChange::new(event, Some(session.clone())));
        Ok(session)
    }

    /// Forget the stored session and announce the sign-out
    fn remove_session(&self) {
        if let Err(e) = self.store.clear() {
            log::warn!("⚠️  Failed to clear stored session: {e}");
        }
        self.events.publish(&AuthStateChange::signed_out());
    }

    fn stored_session(&self) -> AuthResult<Option<Session>> {
        self.store
            .load()
            .map_err(|e| AuthError::internal(e.to_string()))
    }

    /// Exchange the stored refresh token for a new session
    ///
    /// # Errors
    /// Returns an error if there is no stored session or the backend rejects
    /// the refresh token. A rejected token also clears the stored session.
    pub async fn refresh_session(&self) -> AuthResult<Session> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.stored_session()?.ok_or_else(|| {
            AuthError::rejected("Auth session missing!").with_code("session_not_found")
        })?;
        self.refresh_with(&current.refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> AuthResult<Session> {
        let url = self.endpoint("token", &[("grant_type", "refresh_token")])?;
        let request = self
            .request(Method::POST, url, None)
            .json(&json!({ "refresh_token": refresh_token }));

        match self.send_for_session(request).await {
            Ok(session) => {
                log::info!("🔄 Session refreshed for user {}", session.user.id);
                self.install(session, AuthChangeEvent::TokenRefreshed)
            }
            Err(e) => {
                if e.kind == AuthErrorKind::InputRejected {
                    log::warn!("⚠️  Refresh token rejected, signing out: {e}");
                    self.remove_session();
                }
                Err(e)
            }
        }
    }

    /// Stored session, refreshed first if it is about to expire
    async fn fresh_session(&self) -> AuthResult<Option<Session>> {
        let _guard = self.refresh_lock.lock().await;
        let Some(session) = self.stored_session()? else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now(), self.refresh_margin) {
            return Ok(Some(session));
        }

        log::debug!("Stored session expired, refreshing");
        self.refresh_with(&session.refresh_token).await.map(Some)
    }

    /// Keep the stored session fresh in the background
    ///
    /// The returned guard stops the task when dropped.
    #[must_use]
    pub fn spawn_auto_refresh(self: &Arc<Self>, tick: std::time::Duration) -> AutoRefreshGuard {
        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                match client.fresh_session().await {
                    Ok(_) => {}
                    Err(e) if e.kind == AuthErrorKind::Transport => {
                        log::debug!("Auto refresh deferred: {e}");
                    }
                    Err(e) => log::warn!("⚠️  Auto refresh failed: {e}"),
                }
            }
        });
        AutoRefreshGuard { handle }
    }
}

/// Stops the auto-refresh task on drop
pub struct AutoRefreshGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for AutoRefreshGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl AuthBackend for GoTrueClient {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        match self.fresh_session().await {
            Ok(session) => Ok(session),
            // A rejected refresh already cleared the store
            Err(e) if e.kind == AuthErrorKind::InputRejected => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_otp(&self, request: OtpRequest) -> AuthResult<AuthData> {
        let query: Vec<(&str, &str)> = request
            .redirect_to
            .as_deref()
            .map(|redirect| vec![("redirect_to", redirect)])
            .unwrap_or_default();
        let url = self.endpoint("otp", &query)?;
        let body = json!({ "email": request.email, "create_user": request.create_user });

        self.send(self.request(Method::POST, url, None).json(&body))
            .await?;
        log::info!("📧 One-time code requested for {}", request.email);
        Ok(AuthData::empty())
    }

    async fn sign_in_with_password(
        &self,
        credentials: PasswordCredentials,
    ) -> AuthResult<AuthData> {
        let url = self.endpoint("token", &[("grant_type", "password")])?;
        let body = json!({ "email": credentials.email, "password": credentials.password });

        let session = self
            .send_for_session(self.request(Method::POST, url, None).json(&body))
            .await?;
        let session = self.install(session, AuthChangeEvent::SignedIn)?;
        Ok(AuthData::from_session(session))
    }

    async fn sign_up(&self, request: SignUpRequest) -> AuthResult<AuthData> {
        let query: Vec<(&str, &str)> = request
            .redirect_to
            .as_deref()
            .map(|redirect| vec![("redirect_to", redirect)])
            .unwrap_or_default();
        let url = self.endpoint("signup", &query)?;
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": request.data,
        });

        let value: Value = self
            .send(self.request(Method::POST, url, None).json(&body))
            .await?
            .json()
            .await?;

        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)
                .map_err(|e| AuthError::internal(format!("Malformed sign-up session: {e}")))?;
            let session = self.install(session.normalized(), AuthChangeEvent::SignedIn)?;
            return Ok(AuthData::from_session(session));
        }

        let user_value = value.get("user").cloned().unwrap_or(value);
        let user: User = serde_json::from_value(user_value)
            .map_err(|e| AuthError::internal(format!("Malformed sign-up user: {e}")))?;
        log::info!("📝 Account created for {}, awaiting confirmation", request.email);
        Ok(AuthData::from_user(user))
    }

    async fn verify_otp(&self, request: VerifyOtpRequest) -> AuthResult<AuthData> {
        let url = self.endpoint("verify", &[])?;
        let body = json!({
            "email": request.email,
            "token": request.token,
            "type": request.otp_type,
        });

        let session = self
            .send_for_session(self.request(Method::POST, url, None).json(&body))
            .await?;
        let session = self.install(session, AuthChangeEvent::SignedIn)?;
        Ok(AuthData::from_session(session))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            // Nothing usable to revoke server-side; still forget it locally
            Err(StoreError::Corrupted(e)) => {
                log::warn!("⚠️  Discarding unreadable stored session at sign-out: {e}");
                None
            }
            Err(e) => return Err(AuthError::internal(e.to_string())),
        };
        if let Some(session) = stored {
            let url = self.endpoint("logout", &[])?;
            let request = self.request(Method::POST, url, Some(&session.access_token));
            match self.send(request).await {
                Ok(_) => {}
                // Already invalid server-side; still clear locally
                Err(e) if e.is_session_missing() => {
                    log::debug!("Session already invalid at sign-out: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        self.remove_session();
        log::info!("👋 Signed out");
        Ok(())
    }

    async fn update_user(&self, update: ProfileUpdate) -> AuthResult<User> {
        let session = self.fresh_session().await?.ok_or_else(|| {
            AuthError::rejected("Auth session missing!").with_code("session_not_found")
        })?;
        let url = self.endpoint("user", &[])?;
        let request = self
            .request(Method::PUT, url, Some(&session.access_token))
            .json(&json!({ "data": update }));

        let user: User = self.send(request).await?.json().await?;
        let updated = Session {
            user: user.clone(),
            ..session
        };
        self.install(updated, AuthChangeEvent::UserUpdated)?;
        Ok(user)
    }
}
