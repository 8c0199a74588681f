//! Application state for DeepDive.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::db::DbPool;
use crate::middleware::RateLimits;
use crate::services::{
    self, AiClient, AssistantService, CollectionService, CommentService, ExportService,
    ModelCache, NoteService, ReportService, ResourceService, WorkspaceService,
};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Runtime configuration.
    pub config: Arc<Config>,
    /// HTTP client for the AI microservice.
    pub ai: AiClient,
    /// Enabled AI model list.
    pub model_cache: Arc<ModelCache>,
    pub resources: ResourceService,
    pub notes: NoteService,
    pub collections: CollectionService,
    pub comments: CommentService,
    /// Workspaces, AI tasks and their status events.
    pub workspaces: WorkspaceService,
    pub reports: ReportService,
    pub assistant: AssistantService,
    /// Document export.
    pub export: ExportService,
    /// Per-client request quotas.
    pub rate_limits: Arc<RateLimits>,
    /// Prometheus renderer, present when the recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state from the global configuration,
    /// initializing the database and seeding report templates.
    pub async fn new() -> Result<Self> {
        let config = config::config().clone();

        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;
        services::templates::seed_templates(&db).await?;

        Self::from_parts(db, config)
    }

    /// Build the state around an existing pool. The schema must already be applied.
    pub fn from_parts(db: DbPool, config: Config) -> Result<Self> {
        let ai = AiClient::new(&config.ai)?;
        let model_cache = Arc::new(ModelCache::new(config.cache.model_ttl));
        let export = ExportService::from_config(&config.export)?;

        Ok(Self {
            resources: ResourceService::new(db.clone()),
            notes: NoteService::new(db.clone(), ai.clone()),
            collections: CollectionService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            workspaces: WorkspaceService::new(db.clone(), ai.clone()),
            reports: ReportService::new(db.clone(), ai.clone()),
            assistant: AssistantService::new(db.clone(), ai.clone(), model_cache.clone()),
            export,
            rate_limits: Arc::new(RateLimits::with_window(config.rate_limit.window)),
            metrics: None,
            model_cache,
            ai,
            config: Arc::new(config),
            db,
        })
    }

    /// Attach the Prometheus handle used by `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
