//! JWT Token Handler
//! Mission: Generate and validate access tokens securely

use crate::auth::models::Claims;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// Why a token failed to decode. Internal diagnostics only: callers collapse
/// all three into a single "not authorized" response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Expired,
    InvalidSignature,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::Expired => write!(f, "expired token"),
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
        }
    }
}

impl std::error::Error for TokenError {}

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key. Tokens live for one hour;
    /// expiry is fixed at issuance and never extended by use.
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            ttl: Duration::hours(1),
        }
    }

    /// Create a handler with a custom token lifetime
    pub fn with_ttl(secret: String, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Mint a signed token for an account id
    pub fn issue(&self, account_id: &Uuid) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp() as usize,
            exp: expiration.timestamp() as usize,
        };

        debug!("Issuing token for account {}, expires at {}", account_id, expiration);

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")
    }

    /// Validate a token and extract its claims.
    ///
    /// Expiry is recomputed here against the current clock with zero leeway,
    /// independent of any earlier check: a token is rejected at and after
    /// `exp`, accepted one second before.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.validate_exp = false; // checked below, inclusive at the boundary

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        })?;

        let now = Utc::now().timestamp();
        if now >= decoded.claims.exp as i64 {
            return Err(TokenError::Expired);
        }

        Ok(decoded.claims)
    }
}
