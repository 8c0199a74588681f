//! YouTube Video Routes
//!
//! Saved videos with transcripts, translations and AI reports.
//!
//! Routes:
//! - POST /youtube-videos - Save or update a video
//! - GET /youtube-videos - The caller's videos
//! - GET /youtube-videos/:id - Get one video
//! - DELETE /youtube-videos/:id - Delete

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db::{self, SaveYoutubeVideo, YoutubeVideo};
use crate::middleware::{require_auth, AuthUser};
use crate::{AppState, Error, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos).post(save_video))
        .route("/:id", get(get_video).delete(delete_video))
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveVideoRequest {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub transcript: Option<String>,
    pub translated_text: Option<String>,
    pub ai_report: Option<String>,
}

async fn save_video(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<SaveVideoRequest>,
) -> Result<Json<YoutubeVideo>> {
    if body.video_id.trim().is_empty() || body.title.trim().is_empty() || body.url.trim().is_empty() {
        return Err(Error::Validation(
            "videoId, title and url are required".to_string(),
        ));
    }

    let video = db::save_youtube_video(
        &state.db,
        SaveYoutubeVideo {
            user_id: user.user_id,
            video_id: body.video_id,
            title: body.title,
            url: body.url,
            transcript: body.transcript,
            translated_text: body.translated_text,
            ai_report: body.ai_report,
        },
    )
    .await?;

    info!(video_id = %video.video_id, "YouTube video saved");
    Ok(Json(video))
}

async fn list_videos(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<YoutubeVideo>>> {
    Ok(Json(db::list_user_videos(&state.db, &user.user_id).await?))
}

async fn get_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<YoutubeVideo>> {
    Ok(Json(db::get_user_video(&state.db, &user.user_id, &id).await?))
}

async fn delete_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    db::delete_user_video(&state.db, &user.user_id, &id).await?;
    Ok(Json(json!({ "message": "Video deleted successfully" })))
}
