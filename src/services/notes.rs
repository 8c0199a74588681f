//! Note service: notes, highlights, AI explanations and graph links.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::db::{self, CreateNote, DbPool, Note, UpdateNote};
use crate::error::{Error, Result};
use crate::models::now_rfc3339;

use super::ai_client::AiClient;

const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffeb3b";
const HIGHLIGHT_ID_LEN: usize = 9;
const EXPLAIN_MODEL: &str = "grok";
const EXPLAIN_UNAVAILABLE: &str = "AI服务暂时不可用";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    pub resource_id: String,
    pub content: String,
    #[serde(default)]
    pub highlights: Vec<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteInput {
    pub content: Option<String>,
    pub highlights: Option<Vec<Value>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightInput {
    pub text: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub color: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainInput {
    pub text: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNodeInput {
    pub node_id: String,
    pub node_type: String,
}

#[derive(Clone)]
pub struct NoteService {
    db: DbPool,
    ai: AiClient,
}

impl NoteService {
    pub fn new(db: DbPool, ai: AiClient) -> Self {
        Self { db, ai }
    }

    pub async fn create(&self, user_id: &str, input: CreateNoteInput) -> Result<Value> {
        if input.content.trim().is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }
        db::get_resource(&self.db, &input.resource_id).await?;

        let note = db::create_note(
            &self.db,
            CreateNote {
                user_id: user_id.to_string(),
                resource_id: input.resource_id,
                content: input.content,
                highlights: input.highlights,
                tags: input.tags,
                is_public: input.is_public,
            },
        )
        .await?;
        debug!(note_id = %note.id, resource_id = %note.resource_id, "Note created");

        self.with_resource(&note).await
    }

    /// The caller's notes, most recently updated first.
    pub async fn list_own(&self, user_id: &str, skip: i64, take: i64) -> Result<Value> {
        let skip = skip.max(0);
        let take = take.clamp(1, 100);
        let (notes, total) = db::list_user_notes(&self.db, user_id, skip, take).await?;

        let mut items = Vec::with_capacity(notes.len());
        for note in &notes {
            items.push(self.with_resource(note).await?);
        }

        Ok(json!({ "notes": items, "total": total, "skip": skip, "take": take }))
    }

    /// Public notes on a resource plus the viewer's own.
    pub async fn list_for_resource(&self, resource_id: &str, viewer: Option<&str>) -> Result<Vec<Note>> {
        db::list_resource_notes(&self.db, resource_id, viewer).await
    }

    pub async fn get(&self, id: &str, viewer: Option<&str>) -> Result<Value> {
        let note = db::get_note(&self.db, id).await?;
        if !note.is_public && viewer != Some(note.user_id.as_str()) {
            return Err(Error::Forbidden(
                "You do not have access to this note".to_string(),
            ));
        }
        self.with_resource(&note).await
    }

    pub async fn update(&self, user_id: &str, id: &str, input: UpdateNoteInput) -> Result<Note> {
        self.owned(user_id, id).await?;
        db::update_note(
            &self.db,
            id,
            UpdateNote {
                content: input.content,
                highlights: input.highlights,
                tags: input.tags,
                is_public: input.is_public,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<Value> {
        self.owned(user_id, id).await?;
        db::delete_note(&self.db, id).await?;
        Ok(json!({ "message": "Note deleted successfully" }))
    }

    pub async fn add_highlight(&self, user_id: &str, id: &str, input: HighlightInput) -> Result<Note> {
        let note = self.owned(user_id, id).await?;
        if input.text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }
        if input.end_offset < input.start_offset {
            return Err(Error::Validation(
                "endOffset must not be before startOffset".to_string(),
            ));
        }

        let mut highlights = note.highlights_vec();
        highlights.push(json!({
            "id": nanoid::nanoid!(HIGHLIGHT_ID_LEN),
            "text": input.text,
            "startOffset": input.start_offset,
            "endOffset": input.end_offset,
            "color": input.color.unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string()),
            "note": input.note,
            "createdAt": now_rfc3339(),
        }));

        self.save_highlights(id, highlights).await
    }

    pub async fn remove_highlight(&self, user_id: &str, id: &str, highlight_id: &str) -> Result<Note> {
        let note = self.owned(user_id, id).await?;
        let mut highlights = note.highlights_vec();
        let before = highlights.len();
        highlights.retain(|h| h.get("id").and_then(Value::as_str) != Some(highlight_id));
        if highlights.len() == before {
            return Err(Error::NotFound("Highlight not found".to_string()));
        }
        self.save_highlights(id, highlights).await
    }

    async fn save_highlights(&self, id: &str, highlights: Vec<Value>) -> Result<Note> {
        db::update_note(
            &self.db,
            id,
            UpdateNote {
                highlights: Some(highlights),
                ..Default::default()
            },
        )
        .await
    }

    /// Ask the AI to explain a passage and record the answer in the note's insights.
    pub async fn explain(&self, user_id: &str, id: &str, input: ExplainInput) -> Result<Note> {
        let note = self.owned(user_id, id).await?;
        if input.text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }

        let payload = json!({
            "message": format!("Please explain the following passage:\n\n{}", input.text),
            "context": input.context.clone().unwrap_or_else(|| note.content.clone()),
            "model": EXPLAIN_MODEL,
            "stream": false,
        });

        let explanation = match self.ai.chat(&payload).await {
            Ok(body) => body
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| EXPLAIN_UNAVAILABLE.to_string()),
            Err(e) => {
                warn!(note_id = %id, error = %e, "AI explanation failed");
                EXPLAIN_UNAVAILABLE.to_string()
            }
        };

        let insights = append_explanation(note.ai_insights_json(), &input.text, &explanation);
        db::update_note(
            &self.db,
            id,
            UpdateNote {
                ai_insights: Some(insights),
                ..Default::default()
            },
        )
        .await
    }

    /// Link a knowledge-graph node to the note. Linking twice is a no-op.
    pub async fn add_graph_node(&self, user_id: &str, id: &str, input: GraphNodeInput) -> Result<Note> {
        let note = self.owned(user_id, id).await?;
        let mut nodes = note.graph_nodes_vec();
        if nodes
            .iter()
            .any(|n| n.get("id").and_then(Value::as_str) == Some(input.node_id.as_str()))
        {
            return Ok(note);
        }

        nodes.push(json!({
            "id": input.node_id,
            "type": input.node_type,
            "linkedAt": now_rfc3339(),
        }));
        db::update_note(
            &self.db,
            id,
            UpdateNote {
                graph_nodes: Some(nodes),
                ..Default::default()
            },
        )
        .await
    }

    async fn owned(&self, user_id: &str, id: &str) -> Result<Note> {
        let note = db::get_note(&self.db, id).await?;
        if note.user_id != user_id {
            return Err(Error::Forbidden(
                "You can only modify your own notes".to_string(),
            ));
        }
        Ok(note)
    }

    async fn with_resource(&self, note: &Note) -> Result<Value> {
        let resource = db::get_resources_by_ids(&self.db, std::slice::from_ref(&note.resource_id))
            .await?
            .into_iter()
            .next();

        let mut body = serde_json::to_value(note).map_err(|e| Error::Internal(e.to_string()))?;
        body["resource"] = resource
            .map(|r| json!({ "id": r.id, "type": r.resource_type, "title": r.title }))
            .unwrap_or(Value::Null);
        Ok(body)
    }
}

fn append_explanation(insights: Value, text: &str, explanation: &str) -> Value {
    let mut map = match insights {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let entry = json!({
        "text": text,
        "explanation": explanation,
        "timestamp": now_rfc3339(),
    });
    match map.get_mut("explanations").and_then(Value::as_array_mut) {
        Some(list) => list.push(entry),
        None => {
            map.insert("explanations".to_string(), Value::Array(vec![entry]));
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_explanation_creates_list() {
        let insights = append_explanation(Value::Null, "passage", "meaning");
        let list = insights["explanations"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["text"], "passage");
        assert_eq!(list[0]["explanation"], "meaning");
    }

    #[test]
    fn test_append_explanation_keeps_other_keys() {
        let existing = json!({ "keywords": ["a"], "explanations": [{ "text": "x" }] });
        let insights = append_explanation(existing, "y", "z");
        assert_eq!(insights["keywords"], json!(["a"]));
        assert_eq!(insights["explanations"].as_array().unwrap().len(), 2);
    }
}
