//! Client-side session controller.
//!
//! Owns the authenticated/unauthenticated state machine the UI renders
//! from. A persisted token is never trusted as-is: startup revalidation asks
//! the server's profile endpoint before the session becomes authenticated.

use crate::auth::models::{
    AccountResponse, AuthResponse, ErrorResponse, LoginRequest, RegisterRequest,
};
use crate::client::storage::TokenStorage;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

/// Where the session currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Startup revalidation has not completed yet
    Unknown,
    /// No valid credential
    Unauthenticated,
    /// Login or registration in flight
    Authenticating,
    /// Token accepted by the server, account resolved
    Authenticated,
}

/// Snapshot of the session state.
///
/// Invariant: `account` is populated exactly when `phase` is
/// `Authenticated`, and only after the server accepted the current token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub phase: SessionPhase,
    pub token: Option<String>,
    pub account: Option<AccountResponse>,
}

impl Session {
    fn unknown() -> Self {
        Self {
            phase: SessionPhase::Unknown,
            token: None,
            account: None,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            token: None,
            account: None,
        }
    }

    fn authenticating() -> Self {
        Self {
            phase: SessionPhase::Authenticating,
            token: None,
            account: None,
        }
    }

    fn authenticated(token: String, account: AccountResponse) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            token: Some(token),
            account: Some(account),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// True while startup revalidation or a login/register is unresolved.
    /// Protected UI must not render while this is set.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Unknown | SessionPhase::Authenticating
        )
    }
}

/// Failures surfaced to the UI. Credential failures, registration
/// rejections, and transport failures stay distinguishable; the UI never
/// claims "wrong password" on a network outage.
#[derive(Debug)]
pub enum SessionError {
    /// Login rejected: unknown email or wrong password (the server does not
    /// say which)
    InvalidCredentials,
    /// Registration rejected (duplicate account or invalid input); carries
    /// the server's message
    Rejected(String),
    /// The persisted token was not accepted
    Unauthorized,
    /// Another login/register/revalidation is already in flight
    Busy,
    /// Network-level failure; the operation may be retried
    Transport(reqwest::Error),
    /// Unexpected server response
    Server(u16, String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidCredentials => write!(f, "invalid credentials"),
            SessionError::Rejected(msg) => write!(f, "registration rejected: {}", msg),
            SessionError::Unauthorized => write!(f, "session expired or invalid"),
            SessionError::Busy => write!(f, "another authentication request is in flight"),
            SessionError::Transport(e) => write!(f, "network error: {}", e),
            SessionError::Server(status, msg) => write!(f, "server error ({}): {}", status, msg),
        }
    }
}

impl std::error::Error for SessionError {}

/// The session controller: single writer of the persisted token slot and of
/// the in-memory session state.
pub struct SessionController {
    base_url: String,
    http: reqwest::Client,
    storage: Arc<dyn TokenStorage>,
    state: watch::Sender<Session>,
    /// Serializes login/register/revalidation; a second call is rejected
    /// with `Busy` instead of racing the first
    op_lock: AsyncMutex<()>,
    /// Bumped by logout so a late-arriving auth response cannot resurrect a
    /// session that was logged out while it was in flight
    epoch: Mutex<u64>,
}

impl SessionController {
    pub fn new(base_url: impl Into<String>, storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(Session::unknown());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            storage,
            state,
            op_lock: AsyncMutex::new(()),
            epoch: Mutex::new(0),
        }
    }

    /// Current session snapshot
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Subscribe to session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Startup revalidation. Re-reads the persisted token and asks the
    /// server whether it is still good; resolves the session to
    /// `Authenticated` or `Unauthenticated` before any protected UI renders.
    ///
    /// A rejected token is cleared from storage. A transport failure leaves
    /// the token in place (it may still be valid) but the session stays
    /// unauthenticated and the error is surfaced for the UI to retry.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        let _op = self.op_lock.try_lock().map_err(|_| SessionError::Busy)?;
        let epoch = self.current_epoch();

        // The slot is re-read every time, never assumed unchanged
        let Some(token) = self.storage.load() else {
            self.apply_if_current(epoch, Session::unauthenticated());
            return Ok(());
        };

        let url = format!("{}/profile", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| {
                self.apply_if_current(epoch, Session::unauthenticated());
                SessionError::Transport(e)
            })?;

        match response.status() {
            StatusCode::OK => {
                let account: AccountResponse =
                    response.json().await.map_err(SessionError::Transport)?;
                info!("Session revalidated for {}", account.username);
                self.commit_authenticated(epoch, token, account);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => {
                debug!("Persisted token rejected, clearing session");
                self.clear_if_current(epoch);
                Ok(())
            }
            status => {
                self.apply_if_current(epoch, Session::unauthenticated());
                Err(Self::server_error(status, response).await)
            }
        }
    }

    /// Authenticate with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let _op = self.op_lock.try_lock().map_err(|_| SessionError::Busy)?;
        let epoch = self.current_epoch();
        self.apply_if_current(epoch, Session::authenticating());

        let url = format!("{}/login", self.base_url);
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self.http.post(&url).json(&request).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.apply_if_current(epoch, Session::unauthenticated());
                return Err(SessionError::Transport(e));
            }
        };

        match response.status() {
            StatusCode::OK => {
                let body: AuthResponse = response.json().await.map_err(SessionError::Transport)?;
                self.commit_authenticated(epoch, body.token, body.account);
                Ok(())
            }
            StatusCode::BAD_REQUEST => {
                self.apply_if_current(epoch, Session::unauthenticated());
                Err(SessionError::InvalidCredentials)
            }
            status => {
                self.apply_if_current(epoch, Session::unauthenticated());
                Err(Self::server_error(status, response).await)
            }
        }
    }

    /// Create an account. The server issues a token with the registration
    /// response, so a successful registration authenticates immediately.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let _op = self.op_lock.try_lock().map_err(|_| SessionError::Busy)?;
        let epoch = self.current_epoch();
        self.apply_if_current(epoch, Session::authenticating());

        let url = format!("{}/register", self.base_url);
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self.http.post(&url).json(&request).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.apply_if_current(epoch, Session::unauthenticated());
                return Err(SessionError::Transport(e));
            }
        };

        match response.status() {
            StatusCode::CREATED => {
                let body: AuthResponse = response.json().await.map_err(SessionError::Transport)?;
                self.commit_authenticated(epoch, body.token, body.account);
                Ok(())
            }
            StatusCode::BAD_REQUEST => {
                self.apply_if_current(epoch, Session::unauthenticated());
                let msg = Self::error_message(response).await;
                Err(SessionError::Rejected(msg))
            }
            status => {
                self.apply_if_current(epoch, Session::unauthenticated());
                Err(Self::server_error(status, response).await)
            }
        }
    }

    /// Tear down the session. Synchronous, infallible, idempotent: tokens
    /// are not server-revocable, so no round-trip is needed. Any auth call
    /// still in flight lands in an older epoch and is discarded.
    pub fn logout(&self) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        if let Err(e) = self.storage.clear() {
            warn!("Failed to clear persisted token: {}", e);
        }
        self.state.send_replace(Session::unauthenticated());
        info!("Session cleared");
    }

    // ===== State transitions =====

    fn current_epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Persist the token and flip to `Authenticated`, unless a logout
    /// happened while the request was in flight.
    fn commit_authenticated(&self, epoch: u64, token: String, account: AccountResponse) {
        let guard = self.epoch.lock();
        if *guard != epoch {
            debug!("Discarding stale auth response (logged out mid-flight)");
            return;
        }
        if let Err(e) = self.storage.store(&token) {
            warn!("Failed to persist token: {}", e);
        }
        self.state.send_replace(Session::authenticated(token, account));
    }

    /// Drop the persisted token and flip to `Unauthenticated`
    fn clear_if_current(&self, epoch: u64) {
        let guard = self.epoch.lock();
        if *guard != epoch {
            return;
        }
        if let Err(e) = self.storage.clear() {
            warn!("Failed to clear persisted token: {}", e);
        }
        self.state.send_replace(Session::unauthenticated());
    }

    fn apply_if_current(&self, epoch: u64, session: Session) {
        let guard = self.epoch.lock();
        if *guard != epoch {
            return;
        }
        self.state.send_replace(session);
    }

    // ===== Response helpers =====

    async fn error_message(response: reqwest::Response) -> String {
        response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.msg)
            .unwrap_or_else(|_| "Request failed".to_string())
    }

    async fn server_error(status: StatusCode, response: reqwest::Response) -> SessionError {
        SessionError::Server(status.as_u16(), Self::error_message(response).await)
    }
}
