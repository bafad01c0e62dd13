//! `/api/videos` — catalog listing, detail, and delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use vaultcast_common::VideoId;

use super::error::ApiError;
use super::AppContext;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:id", get(get_video))
        .route("/videos/:id", delete(delete_video))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoSummary {
    pub id: String,
    pub original_filename: String,
    pub status: String,
    pub duration_secs: f64,
    pub total_segments: i64,
    pub byte_size: i64,
}

impl From<vaultcast_db::models::Video> for VideoSummary {
    fn from(v: vaultcast_db::models::Video) -> Self {
        Self {
            id: v.id.as_str().to_string(),
            original_filename: v.original_filename,
            status: v.status.to_string(),
            duration_secs: v.duration_secs,
            total_segments: v.total_segments,
            byte_size: v.byte_size,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub summary: VideoSummary,
    pub error_reason: Option<String>,
    pub subtitle_languages: Vec<String>,
}

/// List videos, most recently created first.
#[utoipa::path(get, path = "/api/videos", tag = "videos", responses((status = 200, body = [VideoSummary])))]
pub async fn list_videos(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<VideoSummary>>, ApiError> {
    let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
    let videos = vaultcast_db::queries::videos::list(&conn, query.limit, query.offset)?;
    Ok(Json(videos.into_iter().map(VideoSummary::from).collect()))
}

/// Full metadata for one video, including its subtitle languages.
#[utoipa::path(get, path = "/api/videos/{id}", tag = "videos", responses((status = 200, body = VideoDetail)))]
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoDetail>, ApiError> {
    let video_id = VideoId::new(id);
    let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
    let video = vaultcast_db::queries::videos::get(&conn, &video_id)?;
    let subtitles = vaultcast_db::queries::subtitle_tracks::list(&conn, &video_id)?;

    Ok(Json(VideoDetail {
        error_reason: video.error_reason.clone(),
        subtitle_languages: subtitles.into_iter().filter_map(|t| t.language).collect(),
        summary: VideoSummary::from(video),
    }))
}

/// Initiate a delete: remove catalog rows and best-effort remote cleanup.
#[utoipa::path(delete, path = "/api/videos/{id}", tag = "videos", responses((status = 200), (status = 404)))]
pub async fn delete_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let video_id = VideoId::new(id);
    let deleted = ctx.coordinator.delete(&video_id).await?;
    ctx.cache.clear();
    ctx.state.notify_cache_cleared();
    Ok(if deleted { StatusCode::OK } else { StatusCode::NOT_FOUND })
}
