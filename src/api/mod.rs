//! API routes for DeepDive.
//!
//! Domain routers are nested under the configured prefix (`/api/v1` by
//! default). Health and metrics routes sit at the root.

pub mod ai;
pub mod auth;
pub mod collections;
pub mod comments;
pub mod notes;
pub mod reports;
pub mod resources;
pub mod status;
pub mod workspaces;
pub mod youtube_videos;

use std::time::Duration;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{error_envelope, rate_limit};
use crate::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound for producing a response. Report generation alone may take
/// two minutes upstream.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Build all API routes, relative to the API prefix.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes(state.clone()))
        .nest("/resources", resources::routes(state.clone()))
        .nest("/notes", notes::routes(state.clone()))
        .nest("/collections", collections::routes(state.clone()))
        .nest("/comments", comments::routes(state.clone()))
        .nest("/workspaces", workspaces::routes(state.clone()))
        .nest("/reports", reports::routes(state.clone()))
        .nest("/ai", ai::routes(state.clone()))
        .nest("/youtube-videos", youtube_videos::routes(state))
}

/// Build the complete application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let prefix = state.config.server.api_prefix.clone();
    let api = routes(state.clone());

    let app = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&prefix, api)
    };

    app.merge(status::routes())
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(from_fn_with_state(state.clone(), error_envelope))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
