//! Workspace service.
//!
//! Owns workspace membership, AI workspace tasks and their status
//! tracking. Tasks are enqueued on the AI service; when that fails a
//! local summary is stored instead so the user always gets a result.
//! Non-terminal tasks are polled in the background with exponential
//! backoff and every status change is broadcast to SSE subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::db::{
    self, CreateWorkspaceTask, DbPool, ReportTemplate, Resource, UpdateWorkspaceTask, Workspace,
    WorkspaceResource, WorkspaceTask,
};
use crate::error::{Error, Result};
use crate::models::{now_rfc3339, unique_ids, TaskStatus};

use super::ai_client::{AiClient, AiTaskResource, CreateAiTask};

/// Minimum number of resources a workspace or task works on.
pub const MIN_WORKSPACE_RESOURCES: usize = 2;

const INITIAL_POLL_DELAY: Duration = Duration::from_secs(2);
const MAX_POLL_DELAY: Duration = Duration::from_secs(15);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Status change of a workspace task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub workspace_id: String,
    pub status: TaskStatus,
    pub queue_position: Option<i64>,
    pub estimated_time: Option<i64>,
}

impl TaskEvent {
    pub fn from_task(task: &WorkspaceTask) -> Self {
        Self {
            task_id: task.id.clone(),
            workspace_id: task.workspace_id.clone(),
            status: task.status_enum(),
            queue_position: task.queue_position,
            estimated_time: task.estimated_time,
        }
    }
}

/// Request to run a template against a workspace.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub template_id: String,
    pub model: String,
    pub question: Option<String>,
    pub overrides: Option<Value>,
    pub resource_ids: Option<Vec<String>>,
}

/// Workspace resource joined with its resource row.
#[derive(Debug)]
struct WorkspaceEntry {
    membership: WorkspaceResource,
    resource: Resource,
}

/// Workspace and workspace task operations.
#[derive(Clone)]
pub struct WorkspaceService {
    inner: Arc<WorkspaceInner>,
}

struct WorkspaceInner {
    db: DbPool,
    ai: AiClient,
    events: broadcast::Sender<TaskEvent>,
    /// Running status pollers keyed by task id, tagged with a generation.
    pollers: Mutex<HashMap<String, (u64, AbortHandle)>>,
    next_generation: AtomicU64,
}

impl WorkspaceService {
    pub fn new(db: DbPool, ai: AiClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(WorkspaceInner {
                db,
                ai,
                events,
                pollers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    fn db(&self) -> &DbPool {
        &self.inner.db
    }

    /// Subscribe to task status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, task: &WorkspaceTask) {
        // No subscribers is fine
        let _ = self.inner.events.send(TaskEvent::from_task(task));
    }

    // ========================================================================
    // Workspaces
    // ========================================================================

    /// Create a workspace from at least two distinct resources.
    pub async fn create_workspace(&self, user_id: &str, resource_ids: &[String]) -> Result<Value> {
        let ids = unique_ids(resource_ids);
        if ids.len() < MIN_WORKSPACE_RESOURCES {
            return Err(Error::Validation(
                "a workspace needs at least 2 resources".to_string(),
            ));
        }

        let workspace = db::create_workspace(self.db(), user_id, &ids).await?;
        info!(workspace_id = %workspace.id, resources = ids.len(), "Workspace created");

        self.serialize_workspace(&workspace).await
    }

    /// Load a workspace, checking that `user_id` owns it.
    pub async fn ensure_owner(&self, user_id: &str, workspace_id: &str) -> Result<Workspace> {
        let workspace = db::get_workspace(self.db(), workspace_id).await?;
        if workspace.user_id != user_id {
            return Err(Error::Forbidden(
                "You do not have access to this workspace".to_string(),
            ));
        }
        Ok(workspace)
    }

    pub async fn get_workspace(&self, user_id: &str, workspace_id: &str) -> Result<Value> {
        let workspace = self.ensure_owner(user_id, workspace_id).await?;
        self.serialize_workspace(&workspace).await
    }

    /// Add and remove resources in one transaction.
    pub async fn update_resources(
        &self,
        user_id: &str,
        workspace_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<Value> {
        self.ensure_owner(user_id, workspace_id).await?;

        let add = unique_ids(add);
        let remove = unique_ids(remove);
        if add.is_empty() && remove.is_empty() {
            return Err(Error::Validation(
                "addResourceIds or removeResourceIds must not be empty".to_string(),
            ));
        }

        db::update_workspace_resources(self.db(), workspace_id, &add, &remove).await?;
        debug!(
            workspace_id = %workspace_id,
            added = add.len(),
            removed = remove.len(),
            "Workspace resources updated"
        );

        let workspace = db::get_workspace(self.db(), workspace_id).await?;
        self.serialize_workspace(&workspace).await
    }

    /// Report templates, optionally filtered by category.
    pub async fn list_templates(&self, category: Option<&str>) -> Result<Vec<ReportTemplate>> {
        db::list_templates(self.db(), category).await
    }

    async fn load_entries(&self, workspace_id: &str) -> Result<Vec<WorkspaceEntry>> {
        let memberships = db::list_workspace_resources(self.db(), workspace_id).await?;
        let ids: Vec<String> = memberships.iter().map(|m| m.resource_id.clone()).collect();
        let resources = db::get_resources_by_ids(self.db(), &ids).await?;

        Ok(memberships
            .into_iter()
            .filter_map(|membership| {
                resources
                    .iter()
                    .find(|r| r.id == membership.resource_id)
                    .cloned()
                    .map(|resource| WorkspaceEntry {
                        membership,
                        resource,
                    })
            })
            .collect())
    }

    async fn serialize_workspace(&self, workspace: &Workspace) -> Result<Value> {
        let entries = self.load_entries(&workspace.id).await?;
        let tasks = db::list_workspace_tasks(self.db(), &workspace.id).await?;
        let reports = db::list_workspace_reports(self.db(), &workspace.id).await?;

        let resources: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.membership.resource_id,
                    "metadata": membership_metadata(&entry.membership),
                    "addedAt": entry.membership.created_at,
                    "resource": resource_summary(&entry.resource),
                })
            })
            .collect();

        Ok(json!({
            "id": workspace.id,
            "status": workspace.status,
            "createdAt": workspace.created_at,
            "updatedAt": workspace.updated_at,
            "resourceCount": resources.len(),
            "resources": resources,
            "tasks": tasks.iter().map(|t| serialize_task(t, false)).collect::<Vec<_>>(),
            "reports": reports
                .iter()
                .map(|r| json!({
                    "id": r.id,
                    "title": r.title,
                    "template": r.template,
                    "createdAt": r.created_at,
                }))
                .collect::<Vec<_>>(),
        }))
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Create a task and hand it to the AI service.
    pub async fn create_task(
        &self,
        user_id: &str,
        workspace_id: &str,
        input: CreateTaskInput,
    ) -> Result<Value> {
        self.ensure_owner(user_id, workspace_id).await?;

        if input.template_id.trim().is_empty() {
            return Err(Error::Validation("templateId is required".to_string()));
        }
        if input.model.trim().is_empty() {
            return Err(Error::Validation("model is required".to_string()));
        }

        db::get_template(self.db(), &input.template_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {} not found", input.template_id)))?;

        let entries = self.load_entries(workspace_id).await?;
        if entries.len() < MIN_WORKSPACE_RESOURCES {
            return Err(Error::Validation(
                "the workspace needs at least 2 resources".to_string(),
            ));
        }

        let selected = select_entries(entries, input.resource_ids.as_deref())?;
        let selected_ids: Vec<String> = selected
            .iter()
            .map(|e| e.membership.resource_id.clone())
            .collect();

        let task = db::create_workspace_task(
            self.db(),
            CreateWorkspaceTask {
                workspace_id: workspace_id.to_string(),
                template_id: input.template_id.clone(),
                model: input.model.clone(),
                parameters: json!({
                    "question": input.question,
                    "overrides": input.overrides,
                    "resourceIds": selected_ids,
                }),
            },
        )
        .await?;
        info!(task_id = %task.id, workspace_id = %workspace_id, template_id = %input.template_id, "Workspace task created");

        let task = self.enqueue(task, &input, &selected, &selected_ids).await?;
        self.publish(&task);

        if task.external_task_id.is_some() && !task.status_enum().is_terminal() {
            self.schedule_status_sync(&task.id).await;
        }

        Ok(serialize_task(&task, true))
    }

    async fn enqueue(
        &self,
        task: WorkspaceTask,
        input: &CreateTaskInput,
        selected: &[WorkspaceEntry],
        selected_ids: &[String],
    ) -> Result<WorkspaceTask> {
        let payload = CreateAiTask {
            workspace_id: task.workspace_id.clone(),
            template_id: input.template_id.clone(),
            model: input.model.clone(),
            resources: selected
                .iter()
                .map(|e| AiTaskResource {
                    id: e.membership.resource_id.clone(),
                    metadata: membership_metadata(&e.membership),
                    resource: resource_summary(&e.resource),
                })
                .collect(),
            question: input.question.clone(),
            overrides: input.overrides.clone(),
            resource_ids: selected_ids.to_vec(),
        };

        match self.inner.ai.create_workspace_task(&payload).await {
            Ok(ai_task) => {
                db::update_workspace_task(
                    self.db(),
                    &task.id,
                    UpdateWorkspaceTask {
                        external_task_id: ai_task.id.clone(),
                        status: Some(TaskStatus::from_ai_status(&ai_task.status)),
                        queue_position: ai_task.queue_position(),
                        estimated_time: ai_task.estimated_time(),
                        metadata: Some(ai_task.metadata.clone().unwrap_or_else(|| json!({}))),
                        ..Default::default()
                    },
                )
                .await
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(task_id = %task.id, reason = %reason, "AI service unavailable, storing local fallback result");
                let (result, metadata) = build_fallback(selected, input, selected_ids, &reason);
                db::update_workspace_task(
                    self.db(),
                    &task.id,
                    UpdateWorkspaceTask {
                        status: Some(TaskStatus::Success),
                        result: Some(result),
                        metadata: Some(metadata),
                        finished_at: Some(now_rfc3339()),
                        ..Default::default()
                    },
                )
                .await
            }
        }
    }

    /// Get a task, refreshing its status from the AI service when it is still running.
    pub async fn get_task(&self, user_id: &str, workspace_id: &str, task_id: &str) -> Result<Value> {
        self.ensure_owner(user_id, workspace_id).await?;
        let task = self.find_task(workspace_id, task_id).await?;

        let task = if task.external_task_id.is_some() && !task.status_enum().is_terminal() {
            match self.sync_task_status(&task).await {
                Ok(updated) => updated,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Failed to sync task status");
                    task
                }
            }
        } else {
            task
        };

        Ok(serialize_task(&task, true))
    }

    /// Load a task that belongs to `workspace_id`.
    pub async fn find_task(&self, workspace_id: &str, task_id: &str) -> Result<WorkspaceTask> {
        db::get_workspace_task(self.db(), task_id)
            .await?
            .filter(|t| t.workspace_id == workspace_id)
            .ok_or_else(|| Error::NotFound("Task not found".to_string()))
    }

    /// Pull the latest status from the AI service and store it.
    async fn sync_task_status(&self, task: &WorkspaceTask) -> Result<WorkspaceTask> {
        let Some(external_id) = task.external_task_id.as_deref() else {
            return Ok(task.clone());
        };

        let remote = self.inner.ai.get_workspace_task(external_id).await?;
        let status = TaskStatus::from_ai_status(&remote.status);

        let metadata = remote
            .metadata
            .clone()
            .or_else(|| task.metadata_json())
            .unwrap_or_else(|| json!({}));

        let update = UpdateWorkspaceTask {
            status: Some(status),
            queue_position: remote.queue_position(),
            estimated_time: remote.estimated_time(),
            result: remote.result.clone().filter(|v| !v.is_null()),
            error: remote.error_text(),
            metadata: Some(metadata),
            started_at: (status == TaskStatus::Running && task.started_at.is_none())
                .then(now_rfc3339),
            finished_at: (status.is_terminal() && task.finished_at.is_none()).then(now_rfc3339),
            ..Default::default()
        };

        let updated = db::update_workspace_task(self.db(), &task.id, update).await?;
        if updated.status != task.status {
            info!(task_id = %task.id, status = ?status, "Workspace task status changed");
        }
        self.publish(&updated);

        Ok(updated)
    }

    /// Start polling a task in the background, replacing any earlier poller for it.
    ///
    /// The poller map stays locked until the new handle is registered, so a
    /// poller that finishes immediately still finds its own entry to remove.
    async fn schedule_status_sync(&self, task_id: &str) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let service = self.clone();
        let id = task_id.to_string();

        let mut pollers = self.inner.pollers.lock().await;
        let handle = tokio::spawn(async move {
            service.poll_until_terminal(&id).await;
            let mut pollers = service.inner.pollers.lock().await;
            if matches!(pollers.get(&id), Some((g, _)) if *g == generation) {
                pollers.remove(&id);
            }
        });

        if let Some((_, previous)) =
            pollers.insert(task_id.to_string(), (generation, handle.abort_handle()))
        {
            previous.abort();
        }
    }

    async fn poll_until_terminal(&self, task_id: &str) {
        let mut delay = INITIAL_POLL_DELAY;
        loop {
            tokio::time::sleep(delay).await;
            match self.poll_once(task_id).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => warn!(task_id = %task_id, error = %e, "Background task status sync failed"),
            }
            delay = next_poll_delay(delay);
        }
    }

    /// One background poll. Returns true when polling should stop.
    async fn poll_once(&self, task_id: &str) -> Result<bool> {
        let Some(task) = db::get_workspace_task(self.db(), task_id).await? else {
            return Ok(true);
        };
        if task.external_task_id.is_none() || task.status_enum().is_terminal() {
            return Ok(true);
        }
        let updated = self.sync_task_status(&task).await?;
        Ok(updated.status_enum().is_terminal())
    }

    /// Number of pollers currently tracked.
    pub async fn active_pollers(&self) -> usize {
        self.inner.pollers.lock().await.len()
    }
}

/// Next backoff delay: doubled, capped at 15 seconds.
pub fn next_poll_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_POLL_DELAY)
}

/// Narrow workspace entries to the requested ids, if any.
fn select_entries(
    entries: Vec<WorkspaceEntry>,
    requested: Option<&[String]>,
) -> Result<Vec<WorkspaceEntry>> {
    let Some(requested) = requested else {
        return Ok(entries);
    };

    let ids = unique_ids(requested);
    if let Some(missing) = ids
        .iter()
        .find(|id| !entries.iter().any(|e| &e.membership.resource_id == *id))
    {
        return Err(Error::Validation(format!(
            "resource {} is not part of this workspace",
            missing
        )));
    }
    if ids.len() < MIN_WORKSPACE_RESOURCES {
        return Err(Error::Validation(
            "select at least 2 resources for the task".to_string(),
        ));
    }

    let mut entries = entries;
    let mut selected = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(pos) = entries.iter().position(|e| &e.membership.resource_id == id) {
            selected.push(entries.swap_remove(pos));
        }
    }
    Ok(selected)
}

fn membership_metadata(membership: &WorkspaceResource) -> Value {
    membership
        .metadata
        .as_deref()
        .map(crate::models::parse_json)
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| json!({}))
}

/// Fields of a resource shown inside a workspace.
pub fn resource_summary(resource: &Resource) -> Value {
    json!({
        "id": resource.id,
        "title": resource.title,
        "type": resource.resource_type,
        "primaryCategory": resource.primary_category,
        "tags": crate::models::parse_json(&resource.tags),
        "publishedAt": resource.published_at,
        "abstract": resource.abstract_text,
        "aiSummary": resource.ai_summary,
        "thumbnailUrl": resource.thumbnail_url,
    })
}

/// Serialize a task. The result body is only included when asked for.
pub fn serialize_task(task: &WorkspaceTask, include_result: bool) -> Value {
    let mut value = json!({
        "id": task.id,
        "workspaceId": task.workspace_id,
        "templateId": task.template_id,
        "externalTaskId": task.external_task_id,
        "model": task.model,
        "status": task.status,
        "queuePosition": task.queue_position,
        "estimatedTime": task.estimated_time,
        "startedAt": task.started_at,
        "finishedAt": task.finished_at,
        "createdAt": task.created_at,
        "updatedAt": task.updated_at,
        "hasResult": task.result.is_some(),
        "hasError": task.error.is_some(),
        "error": task.error,
        "parameters": task.parameters_json(),
        "metadata": task.metadata_json().unwrap_or_else(|| json!({})),
    });
    if include_result {
        value["result"] = task.result_json().unwrap_or(Value::Null);
    }
    value
}

/// Local stand-in result used when the AI service cannot take the task.
fn build_fallback(
    entries: &[WorkspaceEntry],
    input: &CreateTaskInput,
    resource_ids: &[String],
    reason: &str,
) -> (Value, Value) {
    let mut overview = Vec::new();
    let mut details = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let resource = &entry.resource;
        overview.push(format!(
            "{}. {} ({})",
            index + 1,
            resource.title,
            resource.resource_type
        ));

        let mut lines = vec![format!("- Type: {}", resource.resource_type)];
        if let Some(category) = resource.primary_category.as_deref().filter(|c| !c.is_empty()) {
            lines.push(format!("- Category: {}", category));
        }
        let summary = resource
            .ai_summary
            .as_deref()
            .or(resource.abstract_text.as_deref())
            .unwrap_or("No summary available.");
        lines.push(format!("- Summary: {}", summary));
        details.push(format!("### {}\n{}", resource.title, lines.join("\n")));
    }

    let overview = if overview.is_empty() {
        "No resources available.".to_string()
    } else {
        overview.join("\n")
    };
    let details = if details.is_empty() {
        "No details available.".to_string()
    } else {
        details.join("\n\n")
    };
    let question = input
        .question
        .clone()
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| "No additional question provided.".to_string());

    let result = json!({
        "summary": format!(
            "Analyzed {} resources. This output was assembled locally and may lack model insight.",
            entries.len()
        ),
        "sections": [
            { "title": "Resource overview", "content": overview },
            { "title": "User question", "content": question },
            { "title": "Details", "content": details },
        ],
    });

    let metadata = json!({
        "model": input.model,
        "generatedAt": now_rfc3339(),
        "resourceIds": resource_ids,
        "templateId": input.template_id,
        "fallback": true,
        "fallbackReason": reason,
    });

    (result, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_delay_backoff() {
        let mut delay = INITIAL_POLL_DELAY;
        let mut seen = Vec::new();
        for _ in 0..5 {
            delay = next_poll_delay(delay);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, vec![4, 8, 15, 15, 15]);
    }

    fn entry(id: &str, title: &str) -> WorkspaceEntry {
        WorkspaceEntry {
            membership: WorkspaceResource {
                id: format!("wr-{}", id),
                workspace_id: "ws".into(),
                resource_id: id.into(),
                metadata: None,
                created_at: now_rfc3339(),
            },
            resource: Resource {
                id: id.into(),
                resource_type: "PAPER".into(),
                title: title.into(),
                abstract_text: Some(format!("{} abstract", title)),
                content: None,
                source_url: None,
                pdf_url: None,
                thumbnail_url: None,
                authors: "[]".into(),
                published_at: None,
                tags: "[]".into(),
                categories: "[]".into(),
                primary_category: Some("cs.AI".into()),
                ai_summary: None,
                quality_score: 0.0,
                trending_score: 0.0,
                upvote_count: 0,
                view_count: 0,
                created_at: now_rfc3339(),
                updated_at: now_rfc3339(),
            },
        }
    }

    fn input(question: Option<&str>) -> CreateTaskInput {
        CreateTaskInput {
            template_id: "comparison".into(),
            model: "grok".into(),
            question: question.map(String::from),
            overrides: None,
            resource_ids: None,
        }
    }

    #[test]
    fn test_fallback_result_shape() {
        let entries = vec![entry("a", "Alpha"), entry("b", "Beta")];
        let ids = vec!["a".to_string(), "b".to_string()];
        let (result, metadata) = build_fallback(&entries, &input(None), &ids, "connection refused");

        assert!(result["summary"].as_str().unwrap().starts_with("Analyzed 2 resources."));
        let sections = result["sections"].as_array().unwrap();
        assert_eq!(sections[0]["content"], "1. Alpha (PAPER)\n2. Beta (PAPER)");
        assert_eq!(sections[1]["content"], "No additional question provided.");
        assert!(sections[2]["content"]
            .as_str()
            .unwrap()
            .contains("### Alpha\n- Type: PAPER\n- Category: cs.AI\n- Summary: Alpha abstract"));

        assert_eq!(metadata["fallback"], true);
        assert_eq!(metadata["fallbackReason"], "connection refused");
        assert_eq!(metadata["resourceIds"], json!(["a", "b"]));
    }

    #[test]
    fn test_select_entries_rejects_foreign_ids() {
        let entries = vec![entry("a", "A"), entry("b", "B"), entry("c", "C")];
        let err = select_entries(entries, Some(&["a".to_string(), "z".to_string()])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_select_entries_requires_two() {
        let entries = vec![entry("a", "A"), entry("b", "B")];
        let err = select_entries(entries, Some(&["a".to_string(), "a".to_string()])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_select_entries_keeps_requested_order() {
        let entries = vec![entry("a", "A"), entry("b", "B"), entry("c", "C")];
        let selected = select_entries(entries, Some(&["c".to_string(), "a".to_string()])).unwrap();
        let ids: Vec<_> = selected.iter().map(|e| e.membership.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
