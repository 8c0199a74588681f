//! Health and Metrics Routes
//!
//! Liveness, readiness and Prometheus metrics.
//!
//! Routes:
//! - GET /health - Basic health check
//! - GET /health/live - Liveness probe
//! - GET /health/ready - Readiness check (database)
//! - GET /metrics - Prometheus metrics

use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Server startup time, set once at startup.
static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the server startup time. Call once during startup.
pub fn init_startup_time() {
    STARTUP_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    STARTUP_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Build health and metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/health/ready", get(readiness_check))
        .route("/metrics", get(prometheus_metrics))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<DependencyCheck>,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// GET /health/live
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Readiness check.
///
/// GET /health/ready
///
/// Returns 503 when the database cannot be reached.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let ready = database.status == HealthStatus::Healthy;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            checks: vec![database],
        }),
    )
}

/// GET /metrics
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = match &state.metrics {
        Some(handle) => handle.render(),
        None => format!(
            "# HELP deepdive_up Whether the service is up\n# TYPE deepdive_up gauge\ndeepdive_up 1\n\
             # HELP deepdive_uptime_seconds Seconds since startup\n# TYPE deepdive_uptime_seconds gauge\n\
             deepdive_uptime_seconds {}\n",
            uptime_seconds()
        ),
    };

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn check_database(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    match crate::db::health_check(&state.db).await {
        Ok(()) => DependencyCheck {
            name: "database".into(),
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            message: None,
        },
        Err(e) => DependencyCheck {
            name: "database".into(),
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(e.to_string()),
        },
    }
}
