//! DERM-AI Backend - Session Authentication Server
//! Mission: Issue, validate, and resolve the credential that gates the app

use anyhow::{Context, Result};
use axum::middleware;
use dotenv::dotenv;
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dermai_backend::{
    auth::{create_router, AppState, JwtHandler, UserStore},
    middleware::request_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("DERM-AI auth server starting");

    let db_path = env::var("AUTH_DB_PATH").unwrap_or_else(|_| "dermai_auth.db".to_string());
    let jwt_secret = match env::var("JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            warn!("JWT_SECRET not set, using development default");
            "dev-secret-change-in-production-minimum-32-characters".to_string()
        }
    };

    let store = Arc::new(UserStore::new(&db_path)?);
    let jwt = Arc::new(JwtHandler::new(jwt_secret));
    let state = AppState { store, jwt };

    info!("Credential store initialized at: {}", db_path);

    let app = create_router(state)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Auth server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing with env-filter support
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dermai_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
