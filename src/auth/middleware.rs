//! Authentication Middleware
//! Mission: Protect API endpoints with access-token validation

use crate::auth::{api::AppState, models::AccountResponse, models::ErrorResponse};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::debug;
use uuid::Uuid;

/// The account resolved by the guard, attached to the request extensions.
/// Handlers behind the guard can rely on it being fully populated.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AccountResponse);

/// Auth middleware that validates bearer tokens and resolves the account.
///
/// A request passes only if the token signature verifies, the token is not
/// expired, and the encoded account still exists. The password hash never
/// enters the request context.
pub async fn auth_guard(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AuthError::NoToken)?;

    let claims = state.jwt.decode(token).map_err(|e| {
        debug!("Token rejected: {}", e);
        AuthError::TokenInvalid
    })?;

    let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;

    let user = state
        .store
        .find_by_id(&account_id)
        .map_err(|e| {
            debug!("Account lookup failed: {}", e);
            AuthError::Internal
        })?
        .ok_or_else(|| {
            debug!("Token references missing account {}", account_id);
            AuthError::AccountMissing
        })?;

    req.extensions_mut()
        .insert(CurrentUser(AccountResponse::from_user(&user)));

    Ok(next.run(req).await)
}

/// Guard failure classes. The distinction exists for diagnostics only; on
/// the wire every rejection is the same 401 so callers cannot probe which
/// check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    NoToken,
    TokenInvalid,
    AccountMissing,
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            AuthError::NoToken | AuthError::TokenInvalid | AuthError::AccountMissing => {
                (StatusCode::UNAUTHORIZED, "Not authorized")
            }
            AuthError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        };

        (
            status,
            Json(ErrorResponse {
                msg: msg.to_string(),
            }),
        )
            .into_response()
    }
}
