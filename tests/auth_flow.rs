//! End-to-end tests of the auth HTTP contract against a live server.

use std::sync::Arc;

use dermai_backend::auth::{create_router, AppState, JwtHandler, UserStore};
use reqwest::StatusCode;
use serde_json::{json, Value};

const SECRET: &str = "integration-test-secret-0123456789abcdef";

struct TestServer {
    base_url: String,
    _db: tempfile::NamedTempFile,
}

async fn spawn_server() -> TestServer {
    let db = tempfile::NamedTempFile::new().unwrap();
    let store = Arc::new(UserStore::new(db.path().to_str().unwrap()).unwrap());
    let jwt = Arc::new(JwtHandler::new(SECRET.to_string()));
    let app = create_router(AppState { store, jwt });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        _db: db,
    }
}

fn ana() -> Value {
    json!({"username": "ana", "email": "ana@x.com", "password": "pw123456"})
}

#[tokio::test]
async fn scenario_a_register_login_profile() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    // Register
    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&ana())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap();
    assert!(!token.is_empty());
    let account_id = body["account"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["account"]["username"], "ana");
    assert_eq!(body["account"]["email"], "ana@x.com");

    // Login with the same credentials; the token encodes the same account
    let response = client
        .post(format!("{}/login", server.base_url))
        .json(&json!({"email": "ana@x.com", "password": "pw123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let login_token = body["token"].as_str().unwrap().to_string();
    let claims = JwtHandler::new(SECRET.to_string())
        .decode(&login_token)
        .unwrap();
    assert_eq!(claims.sub, account_id);

    // Profile returns the account projection, never the password hash
    let response = client
        .get(format!("{}/profile", server.base_url))
        .bearer_auth(&login_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let profile: Value = response.json().await.unwrap();
    let fields = profile.as_object().unwrap();
    assert_eq!(fields.len(), 3);
    assert!(fields.contains_key("id"));
    assert!(fields.contains_key("username"));
    assert!(fields.contains_key("email"));
    assert_eq!(profile["id"], account_id.as_str());

    // Tokens are stateless: a token the client discarded still verifies
    // server-side until it expires
    let response = client
        .get(format!("{}/profile", server.base_url))
        .bearer_auth(&login_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scenario_b_unknown_email_and_wrong_password_look_identical() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/register", server.base_url))
        .json(&ana())
        .send()
        .await
        .unwrap();

    let wrong_password = client
        .post(format!("{}/login", server.base_url))
        .json(&json!({"email": "ana@x.com", "password": "WRONG"}))
        .send()
        .await
        .unwrap();
    let unknown_email = client
        .post(format!("{}/login", server.base_url))
        .json(&json!({"email": "nobody@x.com", "password": "pw123456"}))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::BAD_REQUEST);
    assert_eq!(unknown_email.status(), StatusCode::BAD_REQUEST);

    let body_a: Value = wrong_password.json().await.unwrap();
    let body_b: Value = unknown_email.json().await.unwrap();
    assert_eq!(body_a, body_b);
    assert_eq!(body_a, json!({"msg": "Invalid Credentials"}));
}

#[tokio::test]
async fn register_validation_and_duplicates() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    // Blank field
    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&json!({"username": "", "email": "a@x.com", "password": "pw123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Short password
    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&json!({"username": "ana", "email": "ana@x.com", "password": "pw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // First registration succeeds, retry with the same email fails
    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&ana())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&json!({"username": "ana2", "email": "ANA@X.COM", "password": "pw123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["msg"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn concurrent_identical_registrations_one_winner() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let fire = |client: reqwest::Client, base: String| async move {
        client
            .post(format!("{}/register", base))
            .json(&ana())
            .send()
            .await
            .unwrap()
            .status()
    };

    let (a, b) = tokio::join!(
        fire(client.clone(), server.base_url.clone()),
        fire(client.clone(), server.base_url.clone()),
    );

    let statuses = [a, b];
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let rejected = statuses
        .iter()
        .filter(|s| **s == StatusCode::BAD_REQUEST)
        .count();

    assert_eq!(created, 1);
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn guard_rejections_are_uniform() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    // No Authorization header
    let no_token = client
        .get(format!("{}/profile", server.base_url))
        .send()
        .await
        .unwrap();

    // Wrong scheme
    let wrong_scheme = client
        .get(format!("{}/profile", server.base_url))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();

    // Garbage token
    let garbage = client
        .get(format!("{}/profile", server.base_url))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();

    // Well-formed token for an account that does not exist
    let phantom = JwtHandler::new(SECRET.to_string())
        .issue(&uuid::Uuid::new_v4())
        .unwrap();
    let missing_account = client
        .get(format!("{}/profile", server.base_url))
        .bearer_auth(&phantom)
        .send()
        .await
        .unwrap();

    let mut bodies = Vec::new();
    for response in [no_token, wrong_scheme, garbage, missing_account] {
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(response.json::<Value>().await.unwrap());
    }
    // One rejection class on the wire: the caller cannot tell which check failed
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn expired_token_rejected_by_guard() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/register", server.base_url))
        .json(&ana())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let account_id: uuid::Uuid = body["account"]["id"].as_str().unwrap().parse().unwrap();

    // Same secret, already-elapsed lifetime
    let expired = JwtHandler::with_ttl(SECRET.to_string(), chrono::Duration::hours(-1))
        .issue(&account_id)
        .unwrap();

    let response = client
        .get(format!("{}/profile", server.base_url))
        .bearer_auth(&expired)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let server = spawn_server().await;

    let response = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}
