//! `/hls/*` — playlists, segments, and subtitles, served through the cache.
//!
//! The single-variant design (one video track named `"video"`, per the
//! no-adaptive-ladder non-goal) keeps the media-playlist route's `{track}`
//! parameter to exactly one accepted value; it stays in the path so a future
//! multi-rendition ladder would not need a route shape change.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::TryStreamExt;
use tracing::warn;
use vaultcast_blob::RemoteBlobClient;
use vaultcast_common::{Error, Result, VideoId, VideoStatus};
use vaultcast_db::pool::DbPool;
use vaultcast_media::hls::{MasterPlaylist, MediaPlaylist, SegmentEntry, StreamInfo, SubtitleInfo};

use super::error::ApiError;
use super::AppContext;
use crate::cache::prefetch::SegmentSource;
use crate::cache::CacheKey;

const VIDEO_TRACK: &str = "video";
/// Subtitle cache entries share the segment cache's `(video_id, ordinal)`
/// keyspace; track indices are offset far above any realistic segment count
/// so the two namespaces never collide.
const SUBTITLE_ORDINAL_BASE: u32 = 1_000_000_000;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/hls/:id/master.m3u8", get(master_playlist))
        .route("/hls/:id/:track/playlist.m3u8", get(media_playlist))
        .route("/hls/:id/:track/:segment", get(segment))
        .route("/hls/:id/subtitles/:lang", get(subtitle))
}

/// Looks up `(account_id, handle)` from the catalog and downloads from
/// exactly that account — the retrieval path never substitutes accounts.
pub struct CatalogSegmentSource {
    db: DbPool,
    blob: Arc<RemoteBlobClient>,
}

impl CatalogSegmentSource {
    pub fn new(db: DbPool, blob: Arc<RemoteBlobClient>) -> Self {
        Self { db, blob }
    }
}

#[async_trait]
impl SegmentSource for CatalogSegmentSource {
    async fn fetch_segment(&self, video_id: &VideoId, ordinal: u32) -> Result<(Bytes, String)> {
        let segment = {
            let conn = vaultcast_db::pool::get_conn(&self.db)?;
            vaultcast_db::queries::segments::get(&conn, video_id, ordinal as i64)?
        };
        let bytes = download_all(&self.blob, &segment.account_id, &segment.handle).await?;
        Ok((bytes, "video/MP2T".to_string()))
    }
}

async fn download_all(blob: &RemoteBlobClient, account_id: &vaultcast_common::AccountId, handle: &str) -> Result<Bytes> {
    let (stream, size) = blob.download(account_id, handle).await?;
    let mut buf = Vec::with_capacity(size as usize);
    let mut stream = Box::pin(stream);
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| Error::FetchFailed(format!("{account_id}: {e}")))?
    {
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

fn base_url(ctx: &AppContext) -> String {
    let server = &ctx.config.server;
    let scheme = if server.force_https { "https" } else { "http" };
    match &server.public_domain {
        Some(domain) => format!("{scheme}://{domain}"),
        None => format!("{scheme}://{}:{}", server.local_host, server.local_port),
    }
}

/// `GET /hls/{id}/master.m3u8` — one video variant plus subtitle entries.
/// Invisible for anything not yet `active`, per the processing-videos
/// invariant.
pub async fn master_playlist(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let video_id = VideoId::new(id);
    let (video, subtitles) = {
        let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
        let video = vaultcast_db::queries::videos::get(&conn, &video_id)?;
        let subtitles = vaultcast_db::queries::subtitle_tracks::list(&conn, &video_id)?;
        (video, subtitles)
    };
    if video.status != VideoStatus::Active {
        return Err(ApiError(Error::not_found(video_id.to_string())));
    }

    let bandwidth = if video.duration_secs > 0.0 {
        ((video.byte_size as f64 * 8.0) / video.duration_secs) as u64
    } else {
        0
    };
    let codecs = match (&video.video_codec, &video.audio_codec) {
        (Some(v), Some(a)) => Some(format!("{v},{a}")),
        (Some(v), None) => Some(v.clone()),
        _ => None,
    };
    let subtitle_group = (!subtitles.is_empty()).then(|| "subs".to_string());
    let base = base_url(&ctx);

    let mut master = MasterPlaylist::new().with_stream(StreamInfo {
        uri: format!("{base}/hls/{video_id}/{VIDEO_TRACK}/playlist.m3u8"),
        bandwidth,
        codecs,
        subtitle_group: subtitle_group.clone(),
    });
    for track in subtitles {
        let Some(language) = track.language.clone() else { continue };
        master = master.with_subtitle(SubtitleInfo {
            group_id: subtitle_group.clone().unwrap_or_else(|| "subs".to_string()),
            name: track.title.clone().unwrap_or_else(|| language.clone()),
            language: Some(language.clone()),
            uri: format!("{base}/hls/{video_id}/subtitles/{language}"),
            is_default: track.is_default,
            is_forced: track.is_forced,
        });
    }

    Ok(playlist_response(master.render()))
}

/// `GET /hls/{id}/{track}/playlist.m3u8` — dense ordinal-ordered media playlist.
pub async fn media_playlist(
    State(ctx): State<AppContext>,
    Path((id, track)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if track != VIDEO_TRACK {
        return Err(ApiError(Error::not_found(format!("track {track}"))));
    }
    let video_id = VideoId::new(id);
    let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
    let video = vaultcast_db::queries::videos::get(&conn, &video_id)?;
    if video.status != VideoStatus::Active {
        return Err(ApiError(Error::not_found(video_id.to_string())));
    }
    let segments = vaultcast_db::queries::segments::list(&conn, &video_id)?;
    drop(conn);

    if let Some(expected_ordinal) = find_ordinal_gap(&segments) {
        let err = Error::IntegrityViolation(format!("{video_id}: missing segment ordinal {expected_ordinal}"));
        ctx.coordinator.mark_error(&video_id, &err).await;
        return Err(ApiError(err));
    }

    let base = base_url(&ctx);

    let playlist = MediaPlaylist::new(
        segments
            .into_iter()
            .map(|s| SegmentEntry {
                duration_secs: s.duration_secs,
                uri: format!("{base}/hls/{video_id}/{VIDEO_TRACK}/{}", s.filename),
            })
            .collect(),
    );
    Ok(playlist_response(playlist.render()))
}

fn playlist_response(body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

/// `GET /hls/{id}/{track}/{segment}` — serves one `.ts` file through the
/// cache and schedules the prefetcher for the next ordinals in the track.
pub async fn segment(
    State(ctx): State<AppContext>,
    Path((id, track, segment)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if track != VIDEO_TRACK {
        return Err(ApiError(Error::not_found(format!("track {track}"))));
    }
    let video_id = VideoId::new(id);
    let ordinal = parse_ordinal(&segment).ok_or_else(|| ApiError(Error::invalid_input(format!("bad segment name {segment}"))))?;

    let (total_segments, actual_segment_count) = {
        let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
        let total_segments = vaultcast_db::queries::videos::get(&conn, &video_id)?.total_segments;
        let actual_segment_count = vaultcast_db::queries::segments::count(&conn, &video_id)?;
        (total_segments, actual_segment_count)
    };

    if actual_segment_count != total_segments {
        let err = Error::IntegrityViolation(format!(
            "{video_id}: expected {total_segments} segments, found {actual_segment_count}"
        ));
        ctx.coordinator.mark_error(&video_id, &err).await;
        return Err(ApiError(err));
    }
    let total_segments = total_segments as u32;

    let key = CacheKey::new(video_id.clone(), ordinal);
    let source = ctx.segment_source.clone();
    let vid = video_id.clone();
    let (bytes, media_type) = ctx
        .cache
        .get_or_fetch(key, move || async move { source.fetch_segment(&vid, ordinal).await })
        .await?;

    ctx.prefetcher.schedule(video_id, ordinal, total_segments);

    Ok(media_response(bytes, &media_type, &headers))
}

/// `GET /hls/{id}/subtitles/{lang}` — same cache, offset keyspace.
pub async fn subtitle(
    State(ctx): State<AppContext>,
    Path((id, lang)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let video_id = VideoId::new(id);
    let track = {
        let conn = vaultcast_db::pool::get_conn(&ctx.db)?;
        vaultcast_db::queries::subtitle_tracks::get_by_language(&conn, &video_id, &lang)?
    };
    let media_type = subtitle_mime(&track.codec);

    let cache_ordinal = SUBTITLE_ORDINAL_BASE + track.track_index as u32;
    let key = CacheKey::new(video_id.clone(), cache_ordinal);
    let blob = ctx.blob.clone();
    let account_id = track.account_id.clone();
    let handle = track.handle.clone();
    let media_type_for_fetch = media_type.clone();
    let (bytes, media_type) = ctx
        .cache
        .get_or_fetch(key, move || async move {
            let bytes = download_all(&blob, &account_id, &handle).await?;
            Ok((bytes, media_type_for_fetch))
        })
        .await?;

    Ok(media_response(bytes, &media_type, &headers))
}

fn subtitle_mime(codec: &str) -> String {
    match codec.to_ascii_lowercase().as_str() {
        "webvtt" | "vtt" => "text/vtt".to_string(),
        "subrip" | "srt" => "application/x-subrip".to_string(),
        other => format!("application/x-{other}"),
    }
}

/// Finds the first ordinal missing from a dense `0..n` sequence. Catalog
/// writes are single-row inserts (see `queries::segments::insert`'s doc
/// comment), so a gap here means a crash left a hole rather than just a
/// short prefix, and the video can no longer be served correctly.
fn find_ordinal_gap(segments: &[vaultcast_db::models::Segment]) -> Option<i64> {
    segments
        .iter()
        .enumerate()
        .find(|(i, seg)| seg.ordinal != *i as i64)
        .map(|(i, _)| i as i64)
}

fn parse_ordinal(segment_name: &str) -> Option<u32> {
    let stem = segment_name.split('.').next()?;
    stem.parse::<u32>().ok()
}

/// Streams `bytes` with an opportunistic range response: since the cache
/// always holds the full segment, a `Range` header can be satisfied
/// directly from the buffer; an absent or unparseable header just streams
/// the whole body.
fn media_response(bytes: Bytes, media_type: &str, headers: &HeaderMap) -> Response {
    let total = bytes.len() as u64;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total));

    match range {
        Some((start, end)) => {
            let slice = bytes.slice(start as usize..=end as usize);
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, media_type.to_string()),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
                ],
                Body::from(slice),
            )
                .into_response()
        }
        None => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, media_type.to_string()),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            Body::from(bytes),
        )
            .into_response(),
    }
}

/// Parses a single `bytes=start-end` range, clamping to `total - 1`. Multi-
/// range requests and malformed headers fall back to a full response.
fn parse_range(header_value: &str, total: u64) -> Option<(u64, u64)> {
    let spec = header_value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_s, end_s) = spec.split_once('-')?;
    let start: u64 = start_s.parse().ok()?;
    let end = if end_s.is_empty() { total.saturating_sub(1) } else { end_s.parse().ok()? };
    if start > end || end >= total {
        return None;
    }
    Some((start, end.min(total.saturating_sub(1))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn rejects_multi_range() {
        assert_eq!(parse_range("bytes=0-10,20-30", 1000), None);
    }

    #[test]
    fn ordinal_parses_zero_padded_filename() {
        assert_eq!(parse_ordinal("00042.ts"), Some(42));
    }

    fn segment_row(ordinal: i64) -> vaultcast_db::models::Segment {
        vaultcast_db::models::Segment {
            video_id: VideoId::new("sample"),
            ordinal,
            filename: format!("{ordinal:05}.ts"),
            duration_secs: 4.0,
            byte_size: 1000,
            handle: "h".to_string(),
            account_id: vaultcast_common::AccountId::new("acct-0"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn no_gap_in_dense_ordinals() {
        let segments: Vec<_> = (0..4).map(segment_row).collect();
        assert_eq!(find_ordinal_gap(&segments), None);
    }

    #[test]
    fn detects_missing_ordinal() {
        let segments = vec![segment_row(0), segment_row(1), segment_row(3)];
        assert_eq!(find_ordinal_gap(&segments), Some(2));
    }
}
