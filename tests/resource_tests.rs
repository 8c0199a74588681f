//! Resource listing, search suggestion and import tests.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use common::{bearer, build_test_app, seed_resource_titled, seed_resources};
use serde_json::{json, Value};

#[tokio::test]
async fn test_list_resources_paginates() {
    let (server, state) = build_test_app(None).await;
    seed_resources(&state, 5).await;

    let response = server.get("/api/v1/resources?skip=0&take=2").await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["total"], 5);
    assert_eq!(page["pagination"]["hasMore"], true);

    let page: Value = server.get("/api/v1/resources?skip=4&take=2").await.json();
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["pagination"]["hasMore"], false);

    let page: Value = server.get("/api/v1/resources?type=BLOG").await.json();
    assert_eq!(page["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_get_missing_resource_message() {
    let (server, _state) = build_test_app(None).await;

    let response = server.get("/api/v1/resources/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "Resource with ID nope not found");
    assert_eq!(body["statusCode"], 404);
}

#[tokio::test]
async fn test_suggestions_rank_title_matches_first() {
    let (server, state) = build_test_app(None).await;
    seed_resource_titled(&state, "A survey that mentions graph networks").await;
    let exact = seed_resource_titled(&state, "Graph Networks").await;

    let suggestions: Vec<Value> = server
        .get("/api/v1/resources/search/suggestions?q=graph%20networks&limit=5")
        .await
        .json();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["id"], exact.id.as_str());
    assert_eq!(suggestions[0]["highlight"], "Graph Networks");
    assert_eq!(suggestions[0]["type"], "PAPER");

    let empty: Vec<Value> = server
        .get("/api/v1/resources/search/suggestions?q=%20%20")
        .await
        .json();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_create_requires_auth_and_valid_type() {
    let (server, _state) = build_test_app(None).await;
    let body = json!({ "type": "PAPER", "title": "Deep residual learning", "tags": ["cv"] });

    let response = server.post("/api/v1/resources").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/resources")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "type": "PODCAST", "title": "x" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/resources")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let resource: Value = response.json();
    assert_eq!(resource["tags"], json!(["cv"]));
    let id = resource["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/api/v1/resources/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "title": "ResNet" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["title"], "ResNet");

    let response = server
        .delete(&format!("/api/v1/resources/{}", id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Resource deleted successfully");

    let response = server.get(&format!("/api/v1/resources/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_import_skips_known_urls() {
    let (server, _state) = build_test_app(None).await;
    let batch = json!({
        "resources": [
            { "type": "PAPER", "title": "One", "sourceUrl": "https://arxiv.org/abs/1" },
            { "type": "PAPER", "title": "Two", "sourceUrl": "https://arxiv.org/abs/2" },
        ]
    });

    let response = server
        .post("/api/v1/resources/batch")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&batch)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>(), json!({ "created": 2, "skipped": 0 }));

    let response = server
        .post("/api/v1/resources/batch")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&batch)
        .await;
    assert_eq!(response.json::<Value>(), json!({ "created": 0, "skipped": 2 }));

    let stats: Value = server.get("/api/v1/resources/stats/summary").await.json();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["byType"][0], json!({ "type": "PAPER", "count": 2 }));
}

#[tokio::test]
async fn test_list_with_huge_skip_is_empty() {
    let (server, state) = build_test_app(None).await;
    seed_resources(&state, 2).await;

    let response = server
        .get(&format!("/api/v1/resources?skip={}&take=100", i64::MAX))
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert!(page["data"].as_array().unwrap().is_empty());
    assert_eq!(page["pagination"]["total"], 2);
    assert_eq!(page["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let (server, state) = build_test_app(None).await;
    seed_resource_titled(&state, "Reaching 100% recall").await;
    seed_resource_titled(&state, "Graph Networks").await;

    let page: Value = server.get("/api/v1/resources?search=%25").await.json();
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["title"], "Reaching 100% recall");

    let suggestions: Vec<Value> = server
        .get("/api/v1/resources/search/suggestions?q=_")
        .await
        .json();
    assert!(suggestions.is_empty());
}
