//! Note, highlight and AI explanation tests.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use common::{bearer, build_test_app, seed_resource};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn create_note(server: &TestServer, user: &str, resource_id: &str, is_public: bool) -> Value {
    let response = server
        .post("/api/v1/notes")
        .add_header(AUTHORIZATION, bearer(user))
        .json(&json!({
            "resourceId": resource_id,
            "content": "Attention is all you need, apparently.",
            "tags": ["transformers"],
            "isPublic": is_public,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_create_note_embeds_resource() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;

    let note = create_note(&server, "alice", &resource.id, false).await;
    assert_eq!(note["userId"], "alice");
    assert_eq!(note["tags"], json!(["transformers"]));
    assert_eq!(note["highlights"], json!([]));
    assert_eq!(note["resource"]["id"], resource.id.as_str());
    assert_eq!(note["resource"]["type"], "PAPER");

    let response = server
        .post("/api/v1/notes")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "resourceId": resource.id, "content": "   " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/notes")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "resourceId": "missing", "content": "text" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_private_note_visibility() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let private = create_note(&server, "alice", &resource.id, false).await;
    let public = create_note(&server, "alice", &resource.id, true).await;
    let private_id = private["id"].as_str().unwrap();

    server
        .get(&format!("/api/v1/notes/{}", private_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await
        .assert_status_ok();

    let response = server
        .get(&format!("/api/v1/notes/{}", private_id))
        .add_header(AUTHORIZATION, bearer("mallory"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server.get(&format!("/api/v1/notes/{}", private_id)).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // Anonymous readers only see public notes on a resource
    let notes: Vec<Value> = server
        .get(&format!("/api/v1/notes/resource/{}", resource.id))
        .await
        .json();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["id"], public["id"]);

    let notes: Vec<Value> = server
        .get(&format!("/api/v1/notes/resource/{}", resource.id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await
        .json();
    assert_eq!(notes.len(), 2);
}

#[tokio::test]
async fn test_update_and_delete_require_owner() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let note = create_note(&server, "alice", &resource.id, false).await;
    let id = note["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/api/v1/notes/{}", id))
        .add_header(AUTHORIZATION, bearer("mallory"))
        .json(&json!({ "content": "defaced" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = server
        .patch(&format!("/api/v1/notes/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "content": "revised", "isPublic": true }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["content"], "revised");
    assert_eq!(updated["isPublic"], true);
    assert_eq!(updated["tags"], json!(["transformers"]));

    let response = server
        .delete(&format!("/api/v1/notes/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Note deleted successfully");

    let response = server
        .get(&format!("/api/v1/notes/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_own_notes_paginates() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    for _ in 0..3 {
        create_note(&server, "alice", &resource.id, false).await;
    }
    create_note(&server, "bob", &resource.id, true).await;

    let response = server
        .get("/api/v1/notes?skip=1&take=1")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["total"], 3);
    assert_eq!(page["notes"].as_array().unwrap().len(), 1);
    assert_eq!(page["skip"], 1);
    assert_eq!(page["take"], 1);
}

#[tokio::test]
async fn test_highlights_add_and_remove() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let note = create_note(&server, "alice", &resource.id, false).await;
    let id = note["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/v1/notes/{}/highlights", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "text": "all you need", "startOffset": 13, "endOffset": 25 }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    let highlight = &updated["highlights"][0];
    assert_eq!(highlight["color"], "#ffeb3b");
    assert_eq!(highlight["startOffset"], 13);
    let highlight_id = highlight["id"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/v1/notes/{}/highlights", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "text": "x", "startOffset": 10, "endOffset": 5 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .delete(&format!("/api/v1/notes/{}/highlights/{}", id, highlight_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["highlights"], json!([]));

    let response = server
        .delete(&format!("/api/v1/notes/{}/highlights/{}", id, highlight_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_explain_records_ai_answer() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ai/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "It means attention layers replace recurrence.",
        })))
        .mount(&ai)
        .await;

    let (server, state) = build_test_app(Some(&ai.uri())).await;
    let resource = seed_resource(&state).await;
    let note = create_note(&server, "alice", &resource.id, false).await;
    let id = note["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/v1/notes/{}/ai-explain", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "text": "all you need" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    let explanation = &updated["aiInsights"]["explanations"][0];
    assert_eq!(explanation["text"], "all you need");
    assert_eq!(explanation["explanation"], "It means attention layers replace recurrence.");
}

#[tokio::test]
async fn test_explain_falls_back_when_ai_is_down() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let note = create_note(&server, "alice", &resource.id, false).await;
    let id = note["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/v1/notes/{}/ai-explain", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "text": "all you need" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(
        updated["aiInsights"]["explanations"][0]["explanation"],
        "AI服务暂时不可用"
    );
}

#[tokio::test]
async fn test_graph_node_link_is_idempotent() {
    let (server, state) = build_test_app(None).await;
    let resource = seed_resource(&state).await;
    let note = create_note(&server, "alice", &resource.id, false).await;
    let id = note["id"].as_str().unwrap();

    for _ in 0..2 {
        server
            .post(&format!("/api/v1/notes/{}/graph-nodes", id))
            .add_header(AUTHORIZATION, bearer("alice"))
            .json(&json!({ "nodeId": "concept-attention", "nodeType": "concept" }))
            .await
            .assert_status_ok();
    }

    let note: Value = server
        .get(&format!("/api/v1/notes/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await
        .json();
    assert_eq!(note["graphNodes"].as_array().unwrap().len(), 1);
    assert_eq!(note["graphNodes"][0]["type"], "concept");
}
