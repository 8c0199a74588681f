//! AI proxy and model registry tests.

mod common;

use axum::http::{header, header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use common::{bearer, build_test_app};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn register_model(server: &TestServer, name: &str, is_default: bool) -> Value {
    let response = server
        .post("/api/v1/ai/models")
        .add_header(AUTHORIZATION, bearer("admin"))
        .json(&json!({
            "name": name,
            "displayName": name.to_uppercase(),
            "provider": "xai",
            "modelId": format!("{}-2", name),
            "isDefault": is_default,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_model_registry_invalidates_cache() {
    let (server, _state) = build_test_app(None).await;

    let models: Vec<Value> = server.get("/api/v1/ai/models").await.json();
    assert!(models.is_empty());

    let grok = register_model(&server, "grok", true).await;
    register_model(&server, "gemini", false).await;

    let models: Vec<Value> = server.get("/api/v1/ai/models").await.json();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["id"], "grok");
    assert_eq!(models[0]["isDefault"], true);
    assert_eq!(models[0]["description"], "xai GROK");

    let response = server
        .patch(&format!("/api/v1/ai/models/{}", grok["id"].as_str().unwrap()))
        .add_header(AUTHORIZATION, bearer("admin"))
        .json(&json!({ "isEnabled": false }))
        .await;
    response.assert_status_ok();

    let models: Vec<Value> = server.get("/api/v1/ai/models").await.json();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["id"], "gemini");

    let response = server
        .post("/api/v1/ai/models")
        .json(&json!({ "name": "x", "displayName": "X", "provider": "p", "modelId": "m" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_simple_chat_json_reply() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ai/chat"))
        .and(body_partial_json(json!({ "model": "grok-2", "provider": "xai", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "Hi there" })))
        .mount(&ai)
        .await;

    let (server, _state) = build_test_app(Some(&ai.uri())).await;
    register_model(&server, "grok", true).await;

    let response = server
        .post("/api/v1/ai/simple-chat")
        .json(&json!({ "message": "Hello", "model": "grok", "stream": false }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "content": "Hi there", "model": "grok-2" })
    );
}

#[tokio::test]
async fn test_simple_chat_streams_upstream_events() {
    let events = "data: {\"content\":\"Hi\"}\n\ndata: [DONE]\n\n";
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ai/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(events, "text/event-stream"))
        .mount(&ai)
        .await;

    let (server, _state) = build_test_app(Some(&ai.uri())).await;
    register_model(&server, "grok", true).await;

    let response = server
        .post("/api/v1/ai/simple-chat")
        .json(&json!({ "message": "Hello", "model": "grok" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "text/event-stream");
    assert_eq!(response.header(header::CACHE_CONTROL), "no-cache");
    assert_eq!(response.text(), events);
}

#[tokio::test]
async fn test_simple_chat_validation() {
    let (server, _state) = build_test_app(None).await;
    register_model(&server, "grok", true).await;

    let response = server
        .post("/api/v1/ai/simple-chat")
        .json(&json!({ "message": "  " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Message is required");

    let response = server
        .post("/api/v1/ai/simple-chat")
        .json(&json!({ "message": "Hello", "model": "claude" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Model claude is not available");
}

#[tokio::test]
async fn test_insights_parse_fenced_json() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ai/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "```json\n[{\"title\":\"Scale\",\"description\":\"More data helps\",\"importance\":\"high\"}]\n```",
        })))
        .mount(&ai)
        .await;

    let (server, _state) = build_test_app(Some(&ai.uri())).await;
    register_model(&server, "grok", true).await;

    let response = server
        .post("/api/v1/ai/insights")
        .json(&json!({ "content": "A long article", "language": "en" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["insights"][0]["title"], "Scale");
    assert_eq!(body["model"], "grok-2");
}

#[tokio::test]
async fn test_summary_without_models_is_rejected() {
    let (server, _state) = build_test_app(None).await;

    let response = server
        .post("/api/v1/ai/summary")
        .json(&json!({ "content": "text" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "No AI model is available");
}

#[tokio::test]
async fn test_translate_accepts_alternate_field_names() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/ai/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "translatedText": "你好" })))
        .mount(&ai)
        .await;

    let (server, _state) = build_test_app(Some(&ai.uri())).await;

    let response = server
        .post("/api/v1/ai/translate-single")
        .json(&json!({ "text": "Hello" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["translation"], "你好");
    assert_eq!(body["sourceLang"], "en");
    assert_eq!(body["targetLang"], "zh-CN");

    let response = server
        .post("/api/v1/ai/translate-single")
        .json(&json!({ "text": "" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ai_service_down_is_bad_gateway() {
    let (server, _state) = build_test_app(None).await;

    let response = server
        .post("/api/v1/ai/translate-single")
        .json(&json!({ "text": "Hello" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"], "AI_SERVICE_ERROR");
}
