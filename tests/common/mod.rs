//! Shared helpers for API tests.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Duration;
use quillnest::{
    ServerConfig, auth::IpExtractor, create_app, db::Database, rate_limit::RateLimitConfig,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const TEST_KEY: &[u8] = b"01234567890123456789012345678901";
pub const TEST_PASSWORD: &str = "password123";
pub const TEST_IP: &str = "127.0.0.1";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        token_key: TEST_KEY.to_vec(),
        access_token_duration: Duration::minutes(15),
        refresh_token_duration: Duration::hours(24),
        no_signup: false,
        rate_limits: RateLimitConfig::permissive(),
        ip_extractor: Some(IpExtractor::XForwardedFor),
    }
}

/// Create a test app and return (app, db).
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone())).expect("Failed to create app");
    (app, db)
}

/// Create a test app from a custom config.
pub async fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = test_config(db.clone());
    configure(&mut config);
    let app = create_app(&config).expect("Failed to create app");
    (app, db)
}

/// Send a request and return the status and JSON body (`Null` if the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", TEST_IP);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub fn signup_body(username: &str) -> Value {
    json!({
        "username": username,
        "password": TEST_PASSWORD,
        "email": format!("{}@example.com", username),
        "first_name": "Test",
        "last_name": "User",
    })
}

/// Create a user through the API.
pub async fn create_user(app: &Router, username: &str) -> Value {
    let (status, body) = send(app, "POST", "/api/users", None, Some(signup_body(username))).await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
    body
}

/// Tokens returned by a successful login.
pub struct Login {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn login(app: &Router, username: &str) -> Login {
    let (status, body) = send(
        app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "username": username, "password": TEST_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    Login {
        session_id: body["session_id"].as_str().unwrap().to_string(),
        access_token: body["access_token"].as_str().unwrap().to_string(),
        refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Create a user and log them in.
pub async fn create_and_login(app: &Router, username: &str) -> Login {
    create_user(app, username).await;
    login(app, username).await
}

/// Create a post and return its id.
pub async fn create_post(app: &Router, token: &str, title: &str, status: &str, category: &str) -> String {
    let (code, body) = send(
        app,
        "POST",
        "/api/posts",
        Some(token),
        Some(json!({
            "title": title,
            "body": format!("Body of {}", title),
            "status": status,
            "category": category,
        })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED, "create post failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}
