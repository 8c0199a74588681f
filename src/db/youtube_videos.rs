//! Saved YouTube video queries.

use crate::models::{new_id, now_rfc3339};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::FromRow;

use super::DbPool;

/// Saved YouTube video with its transcript and derived artifacts.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeVideo {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub transcript: Option<String>,
    pub translated_text: Option<String>,
    pub ai_report: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for saving a video.
#[derive(Debug, Clone)]
pub struct SaveYoutubeVideo {
    pub user_id: String,
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub transcript: Option<String>,
    pub translated_text: Option<String>,
    pub ai_report: Option<String>,
}

/// Insert or update a video keyed by `(user_id, video_id)`.
///
/// Title and url are always replaced. Transcript, translation and report
/// are only replaced when provided.
pub async fn save_youtube_video(pool: &DbPool, input: SaveYoutubeVideo) -> Result<YoutubeVideo> {
    sqlx::query_as::<_, YoutubeVideo>(
        r#"
        INSERT INTO youtube_videos (id, user_id, video_id, title, url, transcript, translated_text, ai_report)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, video_id) DO UPDATE SET
            title = excluded.title,
            url = excluded.url,
            transcript = COALESCE(excluded.transcript, youtube_videos.transcript),
            translated_text = COALESCE(excluded.translated_text, youtube_videos.translated_text),
            ai_report = COALESCE(excluded.ai_report, youtube_videos.ai_report),
            updated_at = ?
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&input.user_id)
    .bind(&input.video_id)
    .bind(&input.title)
    .bind(&input.url)
    .bind(&input.transcript)
    .bind(&input.translated_text)
    .bind(&input.ai_report)
    .bind(now_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// A user's videos, newest first.
pub async fn list_user_videos(pool: &DbPool, user_id: &str) -> Result<Vec<YoutubeVideo>> {
    sqlx::query_as::<_, YoutubeVideo>(
        "SELECT * FROM youtube_videos WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Get a video owned by `user_id`. Other users' videos are reported as missing.
pub async fn get_user_video(pool: &DbPool, user_id: &str, id: &str) -> Result<YoutubeVideo> {
    sqlx::query_as::<_, YoutubeVideo>("SELECT * FROM youtube_videos WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Video not found".to_string()))
}

pub async fn delete_user_video(pool: &DbPool, user_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM youtube_videos WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Video not found".to_string()));
    }

    Ok(())
}
