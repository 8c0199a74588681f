//! Threaded comment tests.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use common::{bearer, build_test_app, seed_resource};
use serde_json::{json, Value};

async fn post_comment(server: &TestServer, user: &str, resource_id: &str, parent_id: Option<&str>) -> Value {
    let response = server
        .post("/api/v1/comments")
        .add_header(AUTHORIZATION, bearer(user))
        .json(&json!({
            "resourceId": resource_id,
            "content": "  Interesting result  ",
            "parentId": parent_id,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_comment_tree_and_reply_counts() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;

    let root = post_comment(&server, "alice", &resource.id, None).await;
    assert_eq!(root["content"], "Interesting result");
    assert_eq!(root["user"]["username"], "alice");
    let root_id = root["id"].as_str().unwrap();

    post_comment(&server, "bob", &resource.id, Some(root_id)).await;
    post_comment(&server, "carol", &resource.id, Some(root_id)).await;

    let tree: Vec<Value> = server
        .get(&format!("/api/v1/comments/resource/{}", resource.id))
        .await
        .json();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["replyCount"], 2);
    let replies = tree[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["user"]["username"], "bob");
    assert_eq!(replies[1]["user"]["username"], "carol");

    let stats: Value = server
        .get(&format!("/api/v1/comments/resource/{}/stats", resource.id))
        .await
        .json();
    assert_eq!(stats, json!({ "total": 3, "topLevel": 1, "replies": 2 }));
}

#[tokio::test]
async fn test_reply_must_target_same_resource() {
    let (server, state) = build_test_app(None).await;
    let first = seed_resource(&state).await;
    let second = seed_resource(&state).await;
    let root = post_comment(&server, "alice", &first.id, None).await;

    let response = server
        .post("/api/v1/comments")
        .add_header(AUTHORIZATION, bearer("bob"))
        .json(&json!({
            "resourceId": second.id,
            "content": "wrong thread",
            "parentId": root["id"],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/comments")
        .add_header(AUTHORIZATION, bearer("bob"))
        .json(&json!({ "resourceId": first.id, "content": "" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_soft_delete_keeps_placeholder() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let root = post_comment(&server, "alice", &resource.id, None).await;
    let root_id = root["id"].as_str().unwrap();
    let reply = post_comment(&server, "bob", &resource.id, Some(root_id)).await;
    let reply_id = reply["id"].as_str().unwrap();

    let response = server
        .delete(&format!("/api/v1/comments/{}", reply_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .delete(&format!("/api/v1/comments/{}", reply_id))
        .add_header(AUTHORIZATION, bearer("bob"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Comment deleted successfully");

    let deleted: Value = server.get(&format!("/api/v1/comments/{}", reply_id)).await.json();
    assert_eq!(deleted["isDeleted"], true);
    assert_eq!(deleted["content"], "[This comment has been deleted]");
    assert_eq!(deleted["parent"]["id"], root_id);

    let parent: Value = server.get(&format!("/api/v1/comments/{}", root_id)).await.json();
    assert_eq!(parent["replyCount"], 0);
    assert_eq!(parent["replies"], json!([]));

    // Deleted comments can be neither edited nor upvoted
    let response = server
        .patch(&format!("/api/v1/comments/{}", reply_id))
        .add_header(AUTHORIZATION, bearer("bob"))
        .json(&json!({ "content": "undo" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server.post(&format!("/api/v1/comments/{}/upvote", reply_id)).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_edit_and_upvote() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let comment = post_comment(&server, "alice", &resource.id, None).await;
    let id = comment["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/api/v1/comments/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "content": "Revised thought" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["content"], "Revised thought");
    assert_eq!(updated["isEdited"], true);

    for _ in 0..2 {
        server
            .post(&format!("/api/v1/comments/{}/upvote", id))
            .await
            .assert_status_ok();
    }
    let comment: Value = server.get(&format!("/api/v1/comments/{}", id)).await.json();
    assert_eq!(comment["upvoteCount"], 2);

    let response = server.get("/api/v1/comments/missing").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
