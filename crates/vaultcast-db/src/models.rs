//! Rust structs matching the three catalog tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vaultcast_common::{AccountId, VideoId, VideoStatus};

/// A `videos` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: VideoId,
    pub original_filename: String,
    pub container: String,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub duration_secs: f64,
    pub total_segments: i64,
    pub byte_size: i64,
    pub status: VideoStatus,
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A `segments` row. `account_id` is immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub video_id: VideoId,
    pub ordinal: i64,
    pub filename: String,
    pub duration_secs: f64,
    pub byte_size: i64,
    pub handle: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

/// A `subtitle_tracks` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleTrack {
    pub video_id: VideoId,
    pub track_index: i64,
    pub language: Option<String>,
    pub title: Option<String>,
    pub codec: String,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_hearing_impaired: bool,
    pub handle: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}
