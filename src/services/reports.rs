//! Report service.
//!
//! Reports are generated either from a finished workspace task or by
//! asking the AI service directly for a set of resources.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, CreateReport, DbPool, Report, ReportTemplate, Resource};
use crate::error::{Error, Result};
use crate::models::{now_rfc3339, unique_ids};

use super::ai_client::AiClient;
use super::templates::{template_icon, validate_resource_count};

const MIN_REPORT_RESOURCES: usize = 2;
const MAX_REPORT_RESOURCES: usize = 10;
const DEFAULT_REPORT_MODEL: &str = "gpt-4";
const DEFAULT_SUMMARY: &str = "AI generated report summary";

/// Request body of `POST /reports/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportInput {
    #[serde(default)]
    pub resource_ids: Vec<String>,
    pub template_id: Option<String>,
    /// Older clients send the template id under this name.
    pub template: Option<String>,
    pub model: Option<String>,
    pub task_id: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

impl GenerateReportInput {
    fn template_id(&self) -> Option<&str> {
        self.template_id
            .as_deref()
            .or(self.template.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Report generation and retrieval.
#[derive(Clone)]
pub struct ReportService {
    db: DbPool,
    ai: AiClient,
}

impl ReportService {
    pub fn new(db: DbPool, ai: AiClient) -> Self {
        Self { db, ai }
    }

    /// Generate and store a report for `user_id`.
    pub async fn generate(&self, user_id: &str, input: GenerateReportInput) -> Result<Value> {
        let template_id = input
            .template_id()
            .ok_or_else(|| Error::Validation("templateId is required".to_string()))?;
        let template = db::get_template(&self.db, template_id)
            .await?
            .ok_or_else(|| Error::Validation("Invalid templateId".to_string()))?;

        let report = match input.task_id.as_deref() {
            Some(task_id) => {
                let task_id = Uuid::parse_str(task_id)
                    .map_err(|_| Error::Validation("taskId must be a valid UUID".to_string()))?;
                self.generate_from_task(user_id, &template, &task_id.to_string(), &input)
                    .await?
            }
            None => self.generate_from_resources(user_id, &template, &input).await?,
        };

        info!(report_id = %report.id, template = %report.template, resources = report.resource_count, "Report generated");
        report_json(&report)
    }

    async fn generate_from_task(
        &self,
        user_id: &str,
        template: &ReportTemplate,
        task_id: &str,
        input: &GenerateReportInput,
    ) -> Result<Report> {
        let task = db::get_workspace_task(&self.db, task_id)
            .await?
            .ok_or_else(|| Error::NotFound("Task not found".to_string()))?;

        let workspace = db::get_workspace(&self.db, &task.workspace_id).await?;
        if workspace.user_id != user_id {
            return Err(Error::Forbidden(
                "You do not have access to this task".to_string(),
            ));
        }

        let result = task
            .result_json()
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::Validation("Task has no result yet".to_string()))?;

        let resource_ids: Vec<String> = db::list_workspace_resources(&self.db, &workspace.id)
            .await?
            .into_iter()
            .map(|r| r.resource_id)
            .collect();

        db::create_report(
            &self.db,
            CreateReport {
                user_id: user_id.to_string(),
                workspace_id: Some(workspace.id.clone()),
                title: input.title.clone().unwrap_or_else(|| template.name.clone()),
                template: template.id.clone(),
                template_name: template.name.clone(),
                template_icon: template_icon(&template.category).to_string(),
                summary: task_summary(&result, input.notes.as_deref()),
                sections: task_sections(&result),
                resource_ids,
                metadata: json!({
                    "model": task.model,
                    "generatedAt": now_rfc3339(),
                    "templateVersion": template.version,
                    "workspaceId": workspace.id,
                    "taskId": task.id,
                    "rawResult": result,
                }),
            },
        )
        .await
    }

    async fn generate_from_resources(
        &self,
        user_id: &str,
        template: &ReportTemplate,
        input: &GenerateReportInput,
    ) -> Result<Report> {
        let ids = unique_ids(&input.resource_ids);
        if !(MIN_REPORT_RESOURCES..=MAX_REPORT_RESOURCES).contains(&ids.len()) {
            return Err(Error::Validation(
                "Please select 2-10 resources".to_string(),
            ));
        }

        let resources = db::get_resources_by_ids(&self.db, &ids).await?;
        if resources.len() != ids.len() {
            return Err(Error::Validation("Some resources not found".to_string()));
        }
        validate_resource_count(template, resources.len())?;

        let model = input
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REPORT_MODEL.to_string());

        let payload = json!({
            "resources": resources.iter().map(report_resource).collect::<Vec<_>>(),
            "template": template.category,
            "model": model,
        });

        let generated = self.ai.generate_report(&payload).await.map_err(|e| {
            warn!(template = %template.id, error = %e, "AI report generation failed");
            Error::Validation("Failed to generate report. Please try again.".to_string())
        })?;

        let mut metadata = json!({
            "model": model,
            "generatedAt": now_rfc3339(),
            "templateVersion": template.version,
        });
        if let Some(Value::Object(extra)) = generated.metadata {
            if let Value::Object(map) = &mut metadata {
                map.extend(extra);
            }
        }

        db::create_report(
            &self.db,
            CreateReport {
                user_id: user_id.to_string(),
                workspace_id: None,
                title: input.title.clone().unwrap_or(generated.title),
                template: template.id.clone(),
                template_name: template.name.clone(),
                template_icon: template_icon(&template.category).to_string(),
                summary: generated.summary,
                sections: generated.sections,
                resource_ids: ids,
                metadata,
            },
        )
        .await
    }

    /// Forward a chat request about a report to the AI service.
    pub async fn chat(&self, body: &Value) -> Result<Value> {
        self.ai
            .chat(body)
            .await
            .map_err(|e| Error::Validation(format!("AI chat failed: {}", e)))
    }

    /// Paginated report summaries, newest first.
    pub async fn list(&self, user_id: &str, page: i64, limit: i64) -> Result<Value> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1).saturating_mul(limit);
        let (reports, total) = db::list_user_reports(&self.db, user_id, limit, offset).await?;

        Ok(json!({
            "reports": reports.iter().map(report_summary).collect::<Vec<_>>(),
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": (total + limit - 1) / limit,
            },
        }))
    }

    /// A report with its resources. Other users' reports are reported as missing.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Value> {
        let report = db::get_report(&self.db, id).await?;
        if report.user_id != user_id {
            return Err(Error::NotFound("Report not found".to_string()));
        }

        let resources = db::get_resources_by_ids(&self.db, &report.resource_ids_vec()).await?;
        let mut body = report_json(&report)?;
        body["resources"] = resources
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "type": r.resource_type,
                    "title": r.title,
                    "abstract": r.abstract_text,
                    "authors": r.authors_json(),
                    "publishedAt": r.published_at,
                    "thumbnailUrl": r.thumbnail_url,
                    "sourceUrl": r.source_url,
                    "pdfUrl": r.pdf_url,
                    "tags": r.tags_vec(),
                })
            })
            .collect();
        Ok(body)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<Value> {
        let report = db::get_report(&self.db, id).await?;
        if report.user_id != user_id {
            return Err(Error::Forbidden(
                "You can only delete your own reports".to_string(),
            ));
        }
        db::delete_report(&self.db, id).await?;
        info!(report_id = %id, "Report deleted");
        Ok(json!({ "message": "Report deleted successfully" }))
    }
}

fn report_json(report: &Report) -> Result<Value> {
    serde_json::to_value(report).map_err(|e| Error::Internal(e.to_string()))
}

fn report_summary(report: &Report) -> Value {
    json!({
        "id": report.id,
        "title": report.title,
        "template": report.template,
        "templateName": report.template_name,
        "templateIcon": report.template_icon,
        "summary": report.summary,
        "resourceCount": report.resource_count,
        "workspaceId": report.workspace_id,
        "createdAt": report.created_at,
        "updatedAt": report.updated_at,
    })
}

/// Resource fields sent to the report generator.
fn report_resource(resource: &Resource) -> Value {
    json!({
        "id": resource.id,
        "title": resource.title,
        "abstract": resource.abstract_text,
        "authors": resource.authors_json(),
        "published_date": resource.published_at,
        "tags": resource.tags_vec(),
        "type": resource.resource_type,
    })
}

/// Sections of a task result, or the raw result as one JSON block.
fn task_sections(result: &Value) -> Value {
    let well_formed = result
        .get("sections")
        .and_then(Value::as_array)
        .filter(|sections| {
            sections.iter().all(|s| {
                s.get("title").map_or(false, Value::is_string)
                    && s.get("content").map_or(false, Value::is_string)
            })
        });

    match well_formed {
        Some(sections) => Value::Array(sections.clone()),
        None => {
            let pretty = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
            json!([{
                "title": "AI Output",
                "content": format!("```json\n{}\n```", pretty),
            }])
        }
    }
}

fn task_summary(result: &Value, notes: Option<&str>) -> String {
    ["summary", "overview"]
        .iter()
        .find_map(|key| result.get(*key).and_then(Value::as_str))
        .or(notes)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SUMMARY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_sections_keeps_well_formed_sections() {
        let result = json!({
            "sections": [
                { "title": "Overview", "content": "text" },
                { "title": "Details", "content": "more" },
            ]
        });
        assert_eq!(task_sections(&result), result["sections"]);
    }

    #[test]
    fn test_task_sections_wraps_unstructured_output() {
        let result = json!({ "sections": [{ "title": "Only title" }], "score": 3 });
        let sections = task_sections(&result);
        assert_eq!(sections[0]["title"], "AI Output");
        let content = sections[0]["content"].as_str().unwrap();
        assert!(content.starts_with("```json\n{"));
        assert!(content.contains("\"score\": 3"));
    }

    #[test]
    fn test_task_summary_fallback_chain() {
        assert_eq!(task_summary(&json!({ "summary": "s", "overview": "o" }), None), "s");
        assert_eq!(task_summary(&json!({ "overview": "o" }), Some("n")), "o");
        assert_eq!(task_summary(&json!({}), Some("my notes")), "my notes");
        assert_eq!(task_summary(&json!({}), None), DEFAULT_SUMMARY);
    }

    #[test]
    fn test_template_id_aliases() {
        let input = GenerateReportInput {
            template: Some("trend".into()),
            ..Default::default()
        };
        assert_eq!(input.template_id(), Some("trend"));

        let input = GenerateReportInput {
            template_id: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(input.template_id(), None);
    }
}
