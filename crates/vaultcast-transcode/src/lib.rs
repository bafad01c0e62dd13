//! Media probing and the `ffmpeg`-backed transcoder driver.
//!
//! This crate provides:
//! - Probing media files for container, codec, duration, bitrate, and track metadata
//! - The [`TranscoderDriver`] capability interface (probe/segment/reencode)
//!   driving `ffmpeg`/`ffprobe` as async subprocesses
//! - [`Workspace`], a scratch directory for one driver run

mod driver;
mod error;
pub mod probe;
pub mod workspace;

pub use driver::{FfmpegDriver, SegmentOutput, TranscoderDriver};
pub use error::{Error, Result};
pub use probe::{probe, AudioTrack, MediaInfo, SubtitleTrack, VideoTrack};
pub use workspace::Workspace;
