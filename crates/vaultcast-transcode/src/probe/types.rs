//! Media information types returned by [`crate::probe::probe`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Container, codec, and track information for a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub file_path: PathBuf,
    pub file_size: u64,
    /// Container format name as reported by ffprobe (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub container: String,
    pub duration: Option<Duration>,
    /// Source bitrate in bits per second. Feeds the planner's reencode target calc.
    pub bit_rate: Option<u64>,
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

impl MediaInfo {
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }
}

/// Information about a video track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTrack {
    pub index: u32,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
}

/// Information about an audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub index: u32,
    pub codec: String,
    pub channels: u32,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
    pub default: bool,
}

/// Information about a subtitle track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub index: u32,
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub default: bool,
    pub forced: bool,
}
