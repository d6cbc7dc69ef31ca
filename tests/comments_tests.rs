//! Tests for comments on posts.

mod common;

use axum::http::StatusCode;
use common::{create_and_login, create_post, create_test_app, send};
use serde_json::json;

#[tokio::test]
async fn test_comment_and_list() {
    let (app, _db) = create_test_app().await;
    let alice = create_and_login(&app, "alice").await;
    let bob = create_and_login(&app, "bob").await;
    let post = create_post(&app, &alice.access_token, "Post", "published", "rust").await;
    let uri = format!("/api/posts/{}/comments", post);

    for (token, text) in [(&bob.access_token, "First"), (&alice.access_token, "Second")] {
        let (status, body) = send(&app, "POST", &uri, Some(token.as_str()), Some(json!({ "body": text }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post_id"], post.as_str());
        assert_eq!(body["body"], text);
    }

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["username"], "bob");
    assert_eq!(comments[0]["body"], "First");
    assert_eq!(comments[1]["username"], "alice");
}

#[tokio::test]
async fn test_comment_requires_auth() {
    let (app, db) = create_test_app().await;
    let alice = create_and_login(&app, "alice").await;
    let post = create_post(&app, &alice.access_token, "Post", "published", "rust").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post),
        None,
        Some(json!({ "body": "anonymous" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(db.comments().list_by_post(&post).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_comment_on_missing_or_hidden_post() {
    let (app, _db) = create_test_app().await;
    let alice = create_and_login(&app, "alice").await;
    let bob = create_and_login(&app, "bob").await;
    let draft = create_post(&app, &alice.access_token, "Draft", "draft", "rust").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", uuid::Uuid::new_v4()),
        Some(&bob.access_token),
        Some(json!({ "body": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", draft),
        Some(&bob.access_token),
        Some(json!({ "body": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/api/posts/{}/comments", draft), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The author can see comments on their own draft
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/posts/{}/comments", draft),
        Some(&alice.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_comment_rejected() {
    let (app, _db) = create_test_app().await;
    let alice = create_and_login(&app, "alice").await;
    let post = create_post(&app, &alice.access_token, "Post", "published", "rust").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post),
        Some(&alice.access_token),
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_comment_only_by_author() {
    let (app, db) = create_test_app().await;
    let alice = create_and_login(&app, "alice").await;
    let bob = create_and_login(&app, "bob").await;
    let post = create_post(&app, &alice.access_token, "Post", "published", "rust").await;

    let (_, comment) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comments", post),
        Some(&bob.access_token),
        Some(json!({ "body": "Bob was here" })),
    )
    .await;
    let id = comment["id"].as_str().unwrap();
    let uri = format!("/api/comments/{}", id);

    // Even the post's author cannot delete someone else's comment
    let (status, body) = send(&app, "DELETE", &uri, Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(db.comments().get_by_id(id).await.unwrap().is_some());

    let (status, body) = send(&app, "DELETE", &uri, Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert!(db.comments().get_by_id(id).await.unwrap().is_none());

    let (status, _) = send(&app, "DELETE", &uri, Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/comments/nope", Some(&bob.access_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
