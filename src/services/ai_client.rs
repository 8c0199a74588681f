//! HTTP client for the AI microservice.
//!
//! Every call goes to `{AI_SERVICE_URL}/api/v1`. There are no retries.
//! Workspace tasks, chat and translation use the general timeout and
//! report generation uses the longer report timeout.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AiServiceConfig;
use crate::error::{Error, Result};

/// Client for the AI microservice.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    api_base: String,
    timeout: Duration,
    report_timeout: Duration,
}

/// Resource entry sent with a workspace task.
#[derive(Debug, Clone, Serialize)]
pub struct AiTaskResource {
    pub id: String,
    pub metadata: Value,
    pub resource: Value,
}

/// Payload for `POST /workspace-tasks`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAiTask {
    pub workspace_id: String,
    pub template_id: String,
    pub model: String,
    pub resources: Vec<AiTaskResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Value>,
    pub resource_ids: Vec<String>,
}

/// Task state reported by the AI service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTaskStatus {
    pub id: Option<String>,
    #[serde(default)]
    pub status: String,
    pub queue_position: Option<f64>,
    pub estimated_time: Option<f64>,
    pub result: Option<Value>,
    pub error: Option<Value>,
    pub metadata: Option<Value>,
}

impl AiTaskStatus {
    pub fn queue_position(&self) -> Option<i64> {
        self.queue_position.map(|v| v.round() as i64)
    }

    pub fn estimated_time(&self) -> Option<i64> {
        self.estimated_time.map(|v| v.round() as i64)
    }

    /// Error as text. Structured errors are kept as JSON.
    pub fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Report produced by `POST /ai/generate-report`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiReport {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sections: Value,
    pub metadata: Option<Value>,
}

impl AiClient {
    pub fn new(config: &AiServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("DeepDive/1.0")
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: format!("{}/api/v1", config.base_url.trim_end_matches('/')),
            timeout: config.timeout,
            report_timeout: config.report_timeout,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn post(&self, path: &str, timeout: Duration) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_base, path))
            .timeout(timeout)
    }

    /// Fail on non-2xx responses, keeping the upstream body as detail.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::AiService(format!(
            "AI service returned {}: {}",
            status.as_u16(),
            body
        )))
    }

    /// Enqueue a workspace task.
    pub async fn create_workspace_task(&self, payload: &CreateAiTask) -> Result<AiTaskStatus> {
        debug!(template_id = %payload.template_id, "Creating AI workspace task");
        let response = self
            .post("/workspace-tasks", self.timeout)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the state of a workspace task by its external id.
    pub async fn get_workspace_task(&self, external_id: &str) -> Result<AiTaskStatus> {
        debug!(external_id = %external_id, "Fetching AI workspace task status");
        let response = self
            .client
            .get(format!("{}/workspace-tasks/{}", self.api_base, external_id))
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Generate a report from resources.
    pub async fn generate_report(&self, payload: &Value) -> Result<AiReport> {
        let response = self
            .post("/ai/generate-report", self.report_timeout)
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Non-streaming chat. Returns the upstream JSON unchanged.
    pub async fn chat(&self, payload: &Value) -> Result<Value> {
        let response = self.post("/ai/chat", self.timeout).json(payload).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Streaming chat. The caller forwards the body as it arrives.
    pub async fn chat_stream(&self, payload: &Value) -> Result<Response> {
        let response = self.post("/ai/chat", self.timeout).json(payload).send().await?;
        Self::check(response).await
    }

    /// Translate a single text.
    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let response = self
            .post("/ai/translate", self.timeout)
            .json(&serde_json::json!({
                "text": text,
                "sourceLang": source_lang,
                "targetLang": target_lang,
            }))
            .send()
            .await?;
        let body: Value = Self::check(response).await?.json().await?;

        ["translation", "translatedText", "translated_text", "content"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::AiService("Translation response missing text".to_string()))
    }
}
