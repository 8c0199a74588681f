//! AI assistant endpoints: model registry, chat proxy, summaries,
//! insights and translation.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::db::{self, AiModel, CreateAiModel, DbPool, UpdateAiModel};
use crate::error::{Error, Result};

use super::ai_client::AiClient;
use super::model_cache::ModelCache;

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleChatInput {
    #[serde(default)]
    pub message: String,
    pub context: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub stream: bool,
}

fn default_chat_model() -> String {
    "gemini".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "zh".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateInput {
    #[serde(default)]
    pub text: String,
    pub target_lang: Option<String>,
    pub source_lang: Option<String>,
}

/// Reply of the simple chat proxy.
pub enum ChatReply {
    /// Upstream SSE response to forward unchanged.
    Stream(reqwest::Response),
    Json(Value),
}

#[derive(Clone)]
pub struct AssistantService {
    db: DbPool,
    ai: AiClient,
    models: Arc<ModelCache>,
}

impl AssistantService {
    pub fn new(db: DbPool, ai: AiClient, models: Arc<ModelCache>) -> Self {
        Self { db, ai, models }
    }

    // ========================================================================
    // Model registry
    // ========================================================================

    /// Enabled models in the shape the model picker expects.
    pub async fn list_models(&self) -> Result<Vec<Value>> {
        let models = self.models.get(&self.db).await?;
        Ok(models.iter().map(model_json).collect())
    }

    pub async fn create_model(&self, input: CreateAiModel) -> Result<AiModel> {
        let model = db::create_ai_model(&self.db, input).await?;
        self.models.invalidate().await;
        info!(model = %model.name, "AI model registered");
        Ok(model)
    }

    pub async fn update_model(&self, id: &str, input: UpdateAiModel) -> Result<AiModel> {
        let model = db::update_ai_model(&self.db, id, input).await?;
        self.models.invalidate().await;
        info!(model = %model.name, enabled = model.is_enabled, "AI model updated");
        Ok(model)
    }

    async fn find_model(&self, requested: &str) -> Result<AiModel> {
        self.models
            .get(&self.db)
            .await?
            .iter()
            .find(|m| m.matches(requested))
            .cloned()
            .ok_or_else(|| Error::Validation(format!("Model {} is not available", requested)))
    }

    async fn default_model(&self) -> Result<AiModel> {
        // Enabled models are cached default-first
        self.models
            .get(&self.db)
            .await?
            .first()
            .cloned()
            .ok_or_else(|| Error::Validation("No AI model is available".to_string()))
    }

    // ========================================================================
    // Chat
    // ========================================================================

    pub async fn simple_chat(&self, input: SimpleChatInput) -> Result<ChatReply> {
        if input.message.trim().is_empty() {
            return Err(Error::Validation("Message is required".to_string()));
        }
        let model = self.find_model(&input.model).await?;
        debug!(model = %model.name, stream = input.stream, len = input.message.len(), "Simple chat request");

        let prompt = match input.context.as_deref().filter(|c| !c.is_empty()) {
            Some(context) => format!("Context:\n{}\n\nUser Question:\n{}", context, input.message),
            None => input.message.clone(),
        };
        let payload = json!({
            "message": prompt,
            "model": model.model_id,
            "provider": model.provider,
            "stream": input.stream,
        });

        if input.stream {
            return Ok(ChatReply::Stream(self.ai.chat_stream(&payload).await?));
        }

        let body = self.ai.chat(&payload).await?;
        Ok(ChatReply::Json(json!({
            "content": response_content(&body),
            "model": body.get("model").cloned().unwrap_or_else(|| json!(model.model_id)),
        })))
    }

    /// Send one prompt to the default model. Returns the text and the model used.
    async fn complete(&self, prompt: String) -> Result<(String, String)> {
        let model = self.default_model().await?;
        let body = self
            .ai
            .chat(&json!({
                "message": prompt,
                "model": model.model_id,
                "provider": model.provider,
                "stream": false,
            }))
            .await?;

        let used = body
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(model.model_id);
        Ok((response_content(&body), used))
    }

    pub async fn summary(&self, input: ContentInput) -> Result<Value> {
        if input.content.trim().is_empty() {
            return Err(Error::Validation("Content is required".to_string()));
        }
        let prompt = if input.language == "zh" {
            format!(
                "请为以下内容生成简洁的摘要：\n\n{}\n\n要求：简明扼要，突出重点。",
                input.content
            )
        } else {
            format!(
                "Please generate a concise summary of the following content:\n\n{}",
                input.content
            )
        };

        let (summary, model) = self.complete(prompt).await.map_err(|e| match e {
            Error::Validation(_) => e,
            other => {
                error!(error = %other, "Summary failed");
                Error::Validation(format!("Summary failed: {}", other))
            }
        })?;
        Ok(json!({ "summary": summary, "model": model }))
    }

    pub async fn insights(&self, input: ContentInput) -> Result<Value> {
        if input.content.trim().is_empty() {
            return Err(Error::Validation("Content is required".to_string()));
        }
        let language_rule = if input.language == "zh" {
            "All output must be in Simplified Chinese"
        } else {
            "Output in English"
        };
        let prompt = format!(
            "You are a JSON-only API. Extract key insights from the following content.\n\n\
             Content:\n{}\n\n\
             Requirements:\n\
             1. Extract 3-5 key insights\n\
             2. Each insight must have exactly these fields: title, description, importance\n\
             3. importance must be one of: high, medium, low\n\
             4. {}\n\
             5. Output ONLY a valid JSON array, nothing else\n\n\
             JSON output:",
            input.content, language_rule
        );

        let (output, model) = self.complete(prompt).await.map_err(|e| match e {
            Error::Validation(_) => e,
            other => {
                error!(error = %other, "Insights failed");
                Error::Validation(format!("Insights failed: {}", other))
            }
        })?;
        Ok(json!({ "insights": extract_json_array(&output), "model": model }))
    }

    pub async fn translate(&self, input: TranslateInput) -> Result<Value> {
        if input.text.trim().is_empty() {
            return Err(Error::Validation(
                "Text is required for translation".to_string(),
            ));
        }
        let target = input.target_lang.unwrap_or_else(|| "zh-CN".to_string());
        let source = input.source_lang.unwrap_or_else(|| "en".to_string());

        let translation = self.ai.translate(&input.text, &source, &target).await?;
        Ok(json!({
            "success": true,
            "original": input.text,
            "translation": translation,
            "sourceLang": source,
            "targetLang": target,
        }))
    }
}

fn model_json(model: &AiModel) -> Value {
    json!({
        "id": model.name,
        "dbId": model.id,
        "name": model.display_name,
        "provider": model.provider,
        "modelId": model.model_id,
        "icon": model.icon,
        "color": model.color,
        "description": model
            .description
            .clone()
            .unwrap_or_else(|| format!("{} {}", model.provider, model.display_name)),
        "isDefault": model.is_default,
    })
}

fn response_content(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// First JSON array in a model reply, tolerating code fences and prose.
pub fn extract_json_array(content: &str) -> Value {
    let mut text = content.trim();
    if let Some((_, rest)) = text.split_once("```json") {
        text = rest.split("```").next().unwrap_or(rest).trim();
    } else if let Some((_, rest)) = text.split_once("```") {
        text = rest.split("```").next().unwrap_or(rest).trim();
    }

    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str::<Value>(&text[start..=end])
                .ok()
                .filter(Value::is_array)
                .unwrap_or_else(|| json!([]))
        }
        _ => json!([]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_array_from_fenced_block() {
        let reply = "Here you go:\n```json\n[{\"title\":\"a\"}]\n```\nDone.";
        assert_eq!(extract_json_array(reply), json!([{ "title": "a" }]));
    }

    #[test]
    fn test_extract_json_array_from_prose() {
        let reply = "Insights: [1, 2, 3] end";
        assert_eq!(extract_json_array(reply), json!([1, 2, 3]));
    }

    #[test]
    fn test_extract_json_array_invalid_is_empty() {
        assert_eq!(extract_json_array("no array here"), json!([]));
        assert_eq!(extract_json_array("[not json]"), json!([]));
    }
}
