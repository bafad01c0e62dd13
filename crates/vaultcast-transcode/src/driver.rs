//! The [`TranscoderDriver`] capability interface: probe, segment, reencode.
//!
//! [`FfmpegDriver`] is the only implementor, shelling out to `ffmpeg`/`ffprobe`
//! as async subprocesses so a slow encode never blocks a worker thread.

use crate::probe::{probe, MediaInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One segment produced by [`TranscoderDriver::segment`].
#[derive(Debug, Clone)]
pub struct SegmentOutput {
    pub ordinal: u32,
    pub path: PathBuf,
    pub duration_secs: f64,
    pub byte_size: u64,
}

/// Capability interface a transcode backend must implement.
///
/// Mirrors the shape the segment planner drives: probe the source once,
/// split it into fixed-duration segments with a stream copy, and reencode
/// any individual segment that overshoots the size budget.
#[async_trait]
pub trait TranscoderDriver: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<MediaInfo>;

    /// Split `input` into `.ts` segments of `segment_secs` duration (the
    /// final segment may be shorter), written into `out_dir`, ordinal from 0.
    /// Stream-copies video/audio; no reencoding happens here.
    async fn segment(
        &self,
        input: &Path,
        out_dir: &Path,
        segment_secs: f64,
    ) -> Result<Vec<SegmentOutput>>;

    /// Reencode a single segment to `output` targeting `target_bitrate_bps`.
    /// Used when a copy-only segment exceeds the size budget.
    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        target_bitrate_bps: u64,
    ) -> Result<SegmentOutput>;
}

/// `ffmpeg`/`ffprobe` CLI-backed driver.
pub struct FfmpegDriver;

impl FfmpegDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscoderDriver for FfmpegDriver {
    async fn probe(&self, input: &Path) -> Result<MediaInfo> {
        probe(input).await
    }

    async fn segment(
        &self,
        input: &Path,
        out_dir: &Path,
        segment_secs: f64,
    ) -> Result<Vec<SegmentOutput>> {
        tokio::fs::create_dir_all(out_dir).await?;
        let list_path = out_dir.join("segment_list.csv");
        let pattern = out_dir.join("%05d.ts");

        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-map", "0:v:0", "-map", "0:a:0?"])
            .args(["-f", "segment"])
            .args(["-segment_time", &segment_secs.to_string()])
            .args(["-reset_timestamps", "1"])
            .args(["-segment_list_type", "csv"])
            .arg("-segment_list")
            .arg(&list_path)
            .arg(&pattern)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffmpeg")
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("ffmpeg", stderr.to_string()));
        }

        let csv = tokio::fs::read_to_string(&list_path).await?;
        let mut segments = Vec::new();
        for (ordinal, line) in csv.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let mut parts = line.splitn(3, ',');
            let filename = parts
                .next()
                .ok_or_else(|| Error::parse_error("ffmpeg", "empty segment list line"))?;
            let start: f64 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::parse_error("ffmpeg", "bad segment start time"))?;
            let end: f64 = parts
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::parse_error("ffmpeg", "bad segment end time"))?;

            let path = out_dir.join(filename);
            let byte_size = tokio::fs::metadata(&path).await?.len();

            segments.push(SegmentOutput {
                ordinal: ordinal as u32,
                path,
                duration_secs: end - start,
                byte_size,
            });
        }

        Ok(segments)
    }

    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        target_bitrate_bps: u64,
    ) -> Result<SegmentOutput> {
        let kbps = (target_bitrate_bps / 1000).max(1);
        let bitrate_arg = format!("{kbps}k");

        let cmd_output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-b:v", &bitrate_arg])
            .args(["-c:a", "aac"])
            .arg(output)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffmpeg")
                } else {
                    Error::Io(e)
                }
            })?;

        if !cmd_output.status.success() {
            let stderr = String::from_utf8_lossy(&cmd_output.stderr);
            return Err(Error::tool_failed("ffmpeg", stderr.to_string()));
        }

        let info = probe(output).await?;
        let byte_size = tokio::fs::metadata(output).await?.len();

        Ok(SegmentOutput {
            ordinal: 0,
            path: output.to_path_buf(),
            duration_secs: info.duration_secs(),
            byte_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_output_carries_ordinal_and_size() {
        let seg = SegmentOutput {
            ordinal: 3,
            path: PathBuf::from("/tmp/00003.ts"),
            duration_secs: 6.0,
            byte_size: 1024,
        };
        assert_eq!(seg.ordinal, 3);
        assert_eq!(seg.byte_size, 1024);
    }
}
