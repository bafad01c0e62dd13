//! Shared test harness: an in-process mock of the remote attachment
//! platform, and a [`vaultcast_transcode::TranscoderDriver`] that segments
//! a fixture file deterministically without shelling out to ffmpeg.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Multipart, Path as AxPath, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use uuid::Uuid;
use vaultcast_transcode::{MediaInfo, Result as TranscodeResult, SegmentOutput, TranscoderDriver};

/// Bytes keyed by opaque handle, as the external platform would store them.
#[derive(Clone, Default)]
struct PlatformStore {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

/// Spins up an in-process stand-in for the external attachment platform and
/// returns its base URL (suitable as an `AccountConfig::destination_id`).
pub async fn spawn_mock_platform() -> String {
    let store = PlatformStore::default();

    let app = Router::new()
        .route("/upload", post(upload))
        .route("/files/:handle/content", get(download))
        .route("/files/:handle", get(info))
        .route("/ping", get(|| async { StatusCode::OK }))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

async fn upload(State(store): State<PlatformStore>, mut multipart: Multipart) -> Json<serde_json::Value> {
    let mut bytes = Bytes::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            bytes = field.bytes().await.unwrap();
            break;
        }
    }
    let handle = Uuid::new_v4().to_string();
    store.files.lock().unwrap().insert(handle.clone(), bytes);
    Json(serde_json::json!({ "handle": handle }))
}

async fn download(State(store): State<PlatformStore>, AxPath(handle): AxPath<String>) -> Bytes {
    store.files.lock().unwrap().get(&handle).cloned().unwrap_or_default()
}

async fn info(State(store): State<PlatformStore>, AxPath(handle): AxPath<String>) -> Json<serde_json::Value> {
    let size = store.files.lock().unwrap().get(&handle).map(|b| b.len()).unwrap_or(0);
    Json(serde_json::json!({ "remote_path": handle, "size": size }))
}

/// Splits the fixture input into `segment_count` fixed-size `.ts` files of
/// distinct, predictable content (`segment index` repeated), so ingest-then-
/// play tests can assert byte-for-byte round trips without a real codec.
pub struct FakeDriver {
    pub segment_count: u32,
    pub segment_bytes: usize,
}

#[async_trait]
impl TranscoderDriver for FakeDriver {
    async fn probe(&self, input: &Path) -> TranscodeResult<MediaInfo> {
        Ok(MediaInfo {
            file_path: input.to_path_buf(),
            file_size: tokio::fs::metadata(input).await.map(|m| m.len()).unwrap_or(0),
            container: "mp4".to_string(),
            duration: Some(std::time::Duration::from_secs(60)),
            bit_rate: Some(10_000_000),
            video_tracks: vec![vaultcast_transcode::VideoTrack {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: Some(24.0),
            }],
            audio_tracks: vec![vaultcast_transcode::AudioTrack {
                index: 0,
                codec: "aac".to_string(),
                channels: 2,
                sample_rate: Some(48_000),
                language: Some("eng".to_string()),
                default: true,
            }],
            subtitle_tracks: vec![],
        })
    }

    async fn segment(&self, _input: &Path, out_dir: &Path, segment_secs: f64) -> TranscodeResult<Vec<SegmentOutput>> {
        tokio::fs::create_dir_all(out_dir).await?;
        let mut segments = Vec::with_capacity(self.segment_count as usize);
        for ordinal in 0..self.segment_count {
            let path: PathBuf = out_dir.join(format!("{ordinal:05}.ts"));
            let content = vec![ordinal as u8; self.segment_bytes];
            tokio::fs::write(&path, &content).await?;
            segments.push(SegmentOutput {
                ordinal,
                path,
                duration_secs: segment_secs,
                byte_size: content.len() as u64,
            });
        }
        Ok(segments)
    }

    async fn reencode(&self, _input: &Path, output: &Path, _target_bitrate_bps: u64) -> TranscodeResult<SegmentOutput> {
        let content = vec![0u8; self.segment_bytes / 2];
        tokio::fs::write(output, &content).await?;
        Ok(SegmentOutput { ordinal: 0, path: output.to_path_buf(), duration_secs: 4.0, byte_size: content.len() as u64 })
    }
}
