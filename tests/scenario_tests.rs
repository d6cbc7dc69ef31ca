//! End-to-end walk through the account and post lifecycle.

mod common;

use axum::http::StatusCode;
use common::{create_test_app, create_user, login, send};
use serde_json::json;

#[tokio::test]
async fn test_account_lifecycle() {
    let (app, db) = create_test_app().await;

    create_user(&app, "alice").await;
    let alice = login(&app, "alice").await;
    assert!(!alice.access_token.is_empty());
    assert!(!alice.refresh_token.is_empty());
    assert!(uuid::Uuid::parse_str(&alice.session_id).is_ok());

    create_user(&app, "bob").await;
    let bob = login(&app, "bob").await;

    let (status, post) = send(
        &app,
        "POST",
        "/api/posts",
        Some(&alice.access_token),
        Some(json!({
            "title": "Hello world",
            "body": "Original body",
            "status": "published",
            "category": "general",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = post["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/posts/{}", post_id);

    let (status, _) = send(
        &app,
        "PUT",
        &post_uri,
        Some(&bob.access_token),
        Some(json!({ "body": "Bob's body" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, updated) = send(
        &app,
        "PUT",
        &post_uri,
        Some(&alice.access_token),
        Some(json!({ "body": "Updated body" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["body"], "Updated body");

    let (status, _) = send(&app, "DELETE", "/api/users/alice", Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/users/alice", Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &post_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(db.posts().get_by_id(&post_id).await.unwrap().is_none());
    assert!(db.sessions().list_by_username("alice").await.unwrap().is_empty());

    let (status, _) = send(
        &app,
        "POST",
        "/api/tokens/renew",
        None,
        Some(json!({ "refresh_token": alice.refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bob is unaffected
    let (status, _) = send(&app, "GET", "/api/users/bob", Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
}
