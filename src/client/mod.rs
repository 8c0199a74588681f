//! Typed HTTP client for the DeepDive API.
//!
//! Used by front-end tooling and by [`workspace_sync`], which keeps a local
//! resource selection mirrored into a server-side workspace.

pub mod workspace_sync;

pub use workspace_sync::{diff_selection, SyncOutcome, SyncState, WorkspaceSync};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Non-2xx response from the API.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected empty response from {0}")]
    EmptyResponse(String),

    #[error("State file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Workspace as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub resources: Vec<WorkspaceResourceView>,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

impl WorkspaceView {
    /// Resource ids in server order.
    pub fn resource_ids(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceResourceView {
    pub id: String,
    #[serde(default)]
    pub metadata: Value,
    pub added_at: Option<String>,
    #[serde(default)]
    pub resource: Value,
}

/// Body of `POST /workspaces/:id/tasks`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub template_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResourcesRequest<'a> {
    #[serde(skip_serializing_if = "no_ids")]
    add_resource_ids: &'a [String],
    #[serde(skip_serializing_if = "no_ids")]
    remove_resource_ids: &'a [String],
}

fn no_ids(ids: &&[String]) -> bool {
    ids.is_empty()
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct DeepDiveClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl DeepDiveClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:4000/api/v1`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ClientResult<Self> {
        let http = Client::builder().user_agent("DeepDive-Client/1.0").build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request. 204 yields `None`.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<Option<T>> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        Ok(Some(response.json::<T>().await?))
    }

    async fn send_expect<T: DeserializeOwned>(&self, builder: RequestBuilder, path: &str) -> ClientResult<T> {
        self.send(builder)
            .await?
            .ok_or_else(|| ClientError::EmptyResponse(path.to_string()))
    }

    // ------------------------------------------------------------------------
    // Workspaces
    // ------------------------------------------------------------------------

    pub async fn create_workspace(&self, resource_ids: &[String]) -> ClientResult<WorkspaceView> {
        debug!(count = resource_ids.len(), "Creating workspace");
        let builder = self
            .request(reqwest::Method::POST, "/workspaces")
            .json(&json!({ "resourceIds": resource_ids }));
        self.send_expect(builder, "/workspaces").await
    }

    pub async fn get_workspace(&self, id: &str) -> ClientResult<WorkspaceView> {
        let path = format!("/workspaces/{}", id);
        let builder = self.request(reqwest::Method::GET, &path);
        self.send_expect(builder, &path).await
    }

    /// Only non-empty lists are sent.
    pub async fn update_workspace_resources(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> ClientResult<WorkspaceView> {
        let path = format!("/workspaces/{}", id);
        let builder = self
            .request(reqwest::Method::PATCH, &path)
            .json(&UpdateResourcesRequest {
                add_resource_ids: add,
                remove_resource_ids: remove,
            });
        self.send_expect(builder, &path).await
    }

    pub async fn create_workspace_task(&self, workspace_id: &str, request: &CreateTaskRequest) -> ClientResult<Value> {
        let path = format!("/workspaces/{}/tasks", workspace_id);
        let builder = self.request(reqwest::Method::POST, &path).json(request);
        self.send_expect(builder, &path).await
    }

    pub async fn get_workspace_task(&self, workspace_id: &str, task_id: &str) -> ClientResult<Value> {
        let path = format!("/workspaces/{}/tasks/{}", workspace_id, task_id);
        let builder = self.request(reqwest::Method::GET, &path);
        self.send_expect(builder, &path).await
    }

    pub async fn list_templates(&self, category: Option<&str>) -> ClientResult<Vec<Value>> {
        let path = "/workspaces/templates";
        let mut builder = self.request(reqwest::Method::GET, path);
        if let Some(category) = category {
            builder = builder.query(&[("category", category)]);
        }
        self.send_expect(builder, path).await
    }
}

/// Message for a failed response: the body's `message` field, else the raw
/// body, else the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        });

    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_message() {
        let body = r#"{"statusCode":403,"message":"You do not have access to this workspace"}"#;
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, body),
            "You do not have access to this workspace"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_body_then_reason() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_update_request_skips_empty_lists() {
        let add = vec!["r1".to_string()];
        let body = serde_json::to_value(UpdateResourcesRequest {
            add_resource_ids: &add,
            remove_resource_ids: &[],
        })
        .unwrap();
        assert_eq!(body, json!({ "addResourceIds": ["r1"] }));
    }
}
