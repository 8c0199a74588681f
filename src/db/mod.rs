//! Database layer for DeepDive.
//!
//! Provides SQLite connection pooling and query modules
//! for all domain entities.

mod ai_models;
mod collections;
mod comments;
mod notes;
mod pool;
mod reports;
mod resources;
mod templates;
mod users;
mod workspace_tasks;
mod workspaces;
mod youtube_videos;

// Re-export all query modules
pub use ai_models::*;
pub use collections::*;
pub use comments::*;
pub use notes::*;
pub use pool::{health_check, is_in_memory, PoolConfig};
pub use reports::*;
pub use resources::*;
pub use templates::*;
pub use users::*;
pub use workspace_tasks::*;
pub use workspaces::*;
pub use youtube_videos::*;

use crate::Result;
use std::path::Path;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Substring pattern for `LIKE ? ESCAPE '\'`. Wildcards in `term` match literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Initialize the database connection pool.
///
/// Creates parent directories if needed. In-memory databases are kept on a
/// single connection so every query sees the same schema.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    if !is_in_memory(path) {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let config = PoolConfig::for_path(path);
    let options = config.build_connect_options(path)?;
    let pool = config.build_pool_options().connect_with(options).await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let schema = include_str!("../../schema.sql");

    info!("Initializing database schema");

    for statement in schema.split(';') {
        // Strip comment lines, keeping only actual SQL
        let clean_stmt: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let clean_stmt = clean_stmt.trim();
        if clean_stmt.is_empty() {
            continue;
        }
        sqlx::query(clean_stmt).execute(pool).await?;
    }

    info!("Database schema initialized successfully");

    Ok(())
}

/// Alias for initialize_schema.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    initialize_schema(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("graph"), "%graph%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        for table in [
            "users",
            "resources",
            "notes",
            "collections",
            "collection_items",
            "comments",
            "report_templates",
            "workspaces",
            "workspace_resources",
            "workspace_tasks",
            "reports",
            "youtube_videos",
            "ai_models",
        ] {
            assert!(table_names.contains(&table), "{} table missing", table);
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        migrate(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let result = sqlx::query("INSERT INTO notes (id, user_id, resource_id, content) VALUES ('n', 'nobody', 'nothing', 'x')")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }
}
