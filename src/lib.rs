//! DERM-AI Backend Library
//!
//! Session authentication for the skin-photo-analysis app: credential
//! storage, token issuance, route protection, and the client-side session
//! controller. Exposed as a library so the binary and integration tests
//! share the same router and client.

pub mod auth;
pub mod client;
pub mod middleware;
