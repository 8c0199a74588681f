//! Built-in report template catalogue.
//!
//! The catalogue lives in `templates.toml` and is seeded into the
//! `report_templates` table at startup.

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::{error, info};

use crate::db::{self, CreateReportTemplate, DbPool, ReportTemplate};
use crate::error::{Error, Result};

/// One catalogue entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub min_items: i64,
    pub max_items: i64,
    pub sections: Vec<String>,
    pub estimated_time: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct Catalogue {
    templates: Vec<TemplateDefinition>,
}

static CATALOGUE: Lazy<Vec<TemplateDefinition>> = Lazy::new(|| {
    match toml::from_str::<Catalogue>(include_str!("../../templates.toml")) {
        Ok(catalogue) => catalogue.templates,
        Err(e) => {
            error!(error = %e, "Failed to parse built-in template catalogue");
            Vec::new()
        }
    }
});

/// Anything with an allowed resource-count range.
pub trait ItemBounds {
    fn min_items(&self) -> i64;
    fn max_items(&self) -> i64;
}

impl ItemBounds for TemplateDefinition {
    fn min_items(&self) -> i64 {
        self.min_items
    }

    fn max_items(&self) -> i64 {
        self.max_items
    }
}

impl ItemBounds for ReportTemplate {
    fn min_items(&self) -> i64 {
        self.min_items
    }

    fn max_items(&self) -> i64 {
        self.max_items
    }
}

/// All built-in templates.
pub fn builtin_templates() -> &'static [TemplateDefinition] {
    &CATALOGUE
}

pub fn get_template_by_id(id: &str) -> Option<&'static TemplateDefinition> {
    CATALOGUE.iter().find(|t| t.id == id)
}

/// Built-in templates, optionally restricted to one category.
pub fn list_templates(category: Option<&str>) -> Vec<&'static TemplateDefinition> {
    CATALOGUE
        .iter()
        .filter(|t| category.map_or(true, |c| t.category == c))
        .collect()
}

/// Check that `count` resources fit the template's range.
pub fn validate_resource_count<T: ItemBounds + ?Sized>(template: &T, count: usize) -> Result<()> {
    let count = count as i64;
    if count < template.min_items() {
        return Err(Error::Validation(format!(
            "at least {} resources are required",
            template.min_items()
        )));
    }
    if count > template.max_items() {
        return Err(Error::Validation(format!(
            "at most {} resources are allowed",
            template.max_items()
        )));
    }
    Ok(())
}

/// Icon shown for reports of a template category.
pub fn template_icon(category: &str) -> &'static str {
    match category {
        "comparison" => "📊",
        "summary" => "📘",
        "insights" => "💡",
        "relationship" => "🔗",
        _ => "🧩",
    }
}

/// Insert the built-in templates that are not in the database yet.
pub async fn seed_templates(pool: &DbPool) -> Result<usize> {
    let mut inserted = 0;
    for template in builtin_templates() {
        let input = CreateReportTemplate {
            id: template.id.clone(),
            name: template.name.clone(),
            category: template.category.clone(),
            description: Some(template.description.clone()),
            icon: Some(template.icon.clone()),
            min_items: template.min_items,
            max_items: template.max_items,
            sections: template.sections.clone(),
            estimated_time: Some(template.estimated_time.clone()),
            model: template.model.clone(),
        };
        if db::insert_template_if_missing(pool, &input).await? {
            inserted += 1;
        }
    }
    if inserted > 0 {
        info!(count = inserted, "Seeded report templates");
    }
    Ok(inserted)
}
