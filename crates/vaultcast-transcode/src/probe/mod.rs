//! Media file probing: a single `ffprobe`-backed async implementation.

mod ffprobe;
mod types;

pub use ffprobe::probe_with_ffprobe;
pub use types::*;

use crate::Result;
use std::path::Path;

/// Probe a media file, extracting container, codec, duration, bitrate, and
/// track metadata.
pub async fn probe(path: &Path) -> Result<MediaInfo> {
    probe_with_ffprobe(path).await
}
