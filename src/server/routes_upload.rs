//! `/api/upload` — streamed multipart ingest and progress polling.
//!
//! The request body is never buffered in full: each multipart chunk is
//! written straight to a temp file as it arrives, and the job record tracks
//! bytes received so `upload_progress` can report a rate and ETA while the
//! transfer is still in flight. Once the file is fully staged, planning,
//! transcoding and distribution continue in a background task — the HTTP
//! response returns as soon as the bytes are safely on disk.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;
use vaultcast_common::Error;

use super::error::ApiError;
use super::AppContext;
use crate::state::{IngestJob, IngestPhase};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/upload", post(upload))
        .route("/upload/:job/progress", get(upload_progress))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProgressResponse {
    pub job_id: String,
    pub phase: String,
    pub current_bytes: u64,
    pub total_bytes: u64,
    pub rate_bps: Option<f64>,
    pub eta_secs: Option<f64>,
    pub error: Option<String>,
}

/// Stream a multipart `file` field to a temp file in bounded chunks, then
/// hand the staged path off to the coordinator in a background task.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "upload",
    responses((status = 202, body = UploadResponse), (status = 400))
)]
pub async fn upload(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let declared_total = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let job_id = Uuid::new_v4().to_string();
    let mut staged: Option<(tempfile::TempDir, PathBuf)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or("upload.bin").to_string();

        ctx.state.start_job(IngestJob::new(job_id.clone(), original_filename.clone()));

        let dir = tempfile::Builder::new()
            .prefix("vaultcast-upload-")
            .tempdir()
            .map_err(|err| ApiError(Error::internal(err.to_string())))?;
        let dest = dir.path().join(&original_filename);
        let mut file = tokio::fs::File::create(&dest)
            .await
            .map_err(|err| ApiError(Error::internal(err.to_string())))?;

        let mut received = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            received += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|err| ApiError(Error::internal(err.to_string())))?;
            ctx.state.update_progress(&job_id, IngestPhase::Receiving, received, declared_total.max(received));
        }
        file.flush().await.map_err(|err| ApiError(Error::internal(err.to_string())))?;

        staged = Some((dir, dest));
        break;
    }

    let (dir, path) = staged.ok_or_else(|| ApiError(Error::invalid_input("multipart field 'file' is required")))?;

    let coordinator = ctx.coordinator.clone();
    let bg_job_id = job_id.clone();
    tokio::spawn(async move {
        let _dir = dir;
        if let Err(err) = coordinator.ingest_with_job(&path, &bg_job_id).await {
            warn!(job_id = %bg_job_id, error = %err, "background ingest failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(UploadResponse { job_id })))
}

/// Poll an in-flight or recently finished ingest job.
#[utoipa::path(
    get,
    path = "/api/upload/{job}/progress",
    tag = "upload",
    responses((status = 200, body = ProgressResponse), (status = 404))
)]
pub async fn upload_progress(
    State(ctx): State<AppContext>,
    Path(job): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let job = ctx.state.get_job(&job).ok_or_else(|| ApiError(Error::not_found(format!("job {job}"))))?;

    Ok(Json(ProgressResponse {
        job_id: job.id.clone(),
        phase: format!("{:?}", job.phase).to_lowercase(),
        current_bytes: job.current_bytes,
        total_bytes: job.total_bytes,
        rate_bps: job.rate_bps(),
        eta_secs: job.eta_secs(),
        error: job.error.clone(),
    }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(Error::invalid_input(err.to_string()))
}
