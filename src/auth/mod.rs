//! Authentication Module
//! Mission: Gate API access with signed, time-limited tokens

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use api::{create_router, AppState};
pub use jwt::JwtHandler;
pub use middleware::auth_guard;
pub use user_store::UserStore;
