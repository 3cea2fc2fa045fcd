//! Authentication API Endpoints
//! Mission: Provide registration, login, and profile endpoints

use crate::auth::{
    jwt::JwtHandler,
    middleware::{auth_guard, CurrentUser},
    models::{AccountResponse, AuthResponse, ErrorResponse, LoginRequest, RegisterRequest},
    user_store::{verify_password, StoreError, UserStore},
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A fixed bcrypt hash (cost 12, same as DEFAULT_COST). Login runs a
/// verification against it when the email is unknown so that the
/// unknown-email and wrong-password paths take the same time.
const DUMMY_HASH: &str = "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub jwt: Arc<JwtHandler>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Register a new account - POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    if username.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AuthApiError::Validation("All fields are required"));
    }
    if payload.password.len() < 6 {
        return Err(AuthApiError::Validation(
            "Password must be at least 6 characters",
        ));
    }

    let user = state
        .store
        .create_user(username, email, &payload.password)
        .map_err(|e| match e {
            StoreError::Duplicate => AuthApiError::Duplicate,
            StoreError::Internal(err) => {
                warn!("Registration failed: {}", err);
                AuthApiError::Internal
            }
        })?;

    let token = state.jwt.issue(&user.id).map_err(|e| {
        warn!("Token issuance failed: {}", e);
        AuthApiError::Internal
    })?;

    info!("Registered account: {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            account: AccountResponse::from_user(&user),
        }),
    ))
}

/// Authenticate and get a token - POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    let user = state.store.find_by_email(&payload.email).map_err(|e| {
        warn!("Login lookup failed: {}", e);
        AuthApiError::Internal
    })?;

    // Unknown email and wrong password produce the exact same response;
    // the hash comparison runs on both paths so they cost the same.
    let user = match user {
        Some(user) => user,
        None => {
            let _ = verify_password(&payload.password, DUMMY_HASH);
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!("Failed login attempt for account {}", user.id);
        return Err(AuthApiError::InvalidCredentials);
    }

    let token = state.jwt.issue(&user.id).map_err(|e| {
        warn!("Token issuance failed: {}", e);
        AuthApiError::Internal
    })?;

    info!("Login successful: {}", user.username);

    Ok(Json(AuthResponse {
        token,
        account: AccountResponse::from_user(&user),
    }))
}

/// Get the authenticated account - GET /profile
///
/// Thin pass-through: the guard already resolved the account.
pub async fn profile(Extension(current): Extension<CurrentUser>) -> Json<AccountResponse> {
    Json(current.0)
}

// ===== Response Types =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

/// Account service failure taxonomy. Store and token-issuer errors are
/// reclassified here; raw storage or signature errors never cross the wire.
#[derive(Debug)]
pub enum AuthApiError {
    Validation(&'static str),
    Duplicate,
    InvalidCredentials,
    Internal,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::Duplicate => (
                StatusCode::BAD_REQUEST,
                "User already exists with that email or username",
            ),
            AuthApiError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid Credentials"),
            AuthApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        };

        (
            status,
            Json(ErrorResponse {
                msg: message.to_string(),
            }),
        )
            .into_response()
    }
}
