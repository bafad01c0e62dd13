//! Segment planner: picks a per-video segment duration by geometric search,
//! then reencodes any segment that still overshoots the byte cap.
//!
//! Grounded on `vaultcast_transcode::TranscoderDriver` (copy-only `segment`,
//! bitrate-targeted `reencode`) — this module owns the search policy, the
//! driver owns the subprocess mechanics.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use vaultcast_common::{Error, Result, VideoId};
use vaultcast_transcode::{MediaInfo, SegmentOutput, TranscoderDriver};

use crate::config::SegmentConfig;

/// Coarsest-first candidate durations, in seconds. The planner walks this
/// list looking for the largest duration that keeps every segment under the
/// byte cap, to minimize segment count (and thus request/manifest overhead).
const DURATION_SCHEDULE_SECS: [f64; 10] = [30.0, 25.0, 20.0, 15.0, 10.0, 8.0, 6.0, 5.0, 3.0, 2.0];

/// Fraction of the byte cap targeted by a reencode, leaving headroom for
/// container/muxing overhead so the reencoded segment doesn't immediately
/// re-overshoot.
const REENCODE_TARGET_FRACTION: f64 = 0.9;

/// Codecs the output transport-stream segments can carry via stream copy.
const COMPATIBLE_VIDEO_CODECS: &[&str] = &["h264", "hevc", "h265"];
const COMPATIBLE_AUDIO_CODECS: &[&str] = &["aac", "mp3"];

/// Whether `media_info`'s codecs are incompatible with the transport-stream
/// segment format, per spec.md §4.1's probe step: if so, the whole video
/// must be flagged for full transcode before the geometric duration search
/// begins, since a copy-only `segment()` can't remux these codecs.
pub fn needs_full_transcode(media_info: &MediaInfo) -> bool {
    let video_ok = media_info
        .video_tracks
        .iter()
        .all(|t| COMPATIBLE_VIDEO_CODECS.contains(&t.codec.to_ascii_lowercase().as_str()));
    let audio_ok = media_info
        .audio_tracks
        .iter()
        .all(|t| COMPATIBLE_AUDIO_CODECS.contains(&t.codec.to_ascii_lowercase().as_str()));
    !(video_ok && audio_ok)
}

/// Target bitrate for a full-transcode pass: the same size-cap-driven
/// calculation `reencode_one` uses for an individual oversize segment,
/// applied up front against the coarsest candidate duration.
pub fn full_transcode_bitrate(config: &SegmentConfig) -> u64 {
    reencode_bitrate(config.max_segment_bytes, config.max_segment_duration)
}

pub async fn plan(
    driver: &dyn TranscoderDriver,
    video_id: &VideoId,
    input: &Path,
    out_dir: &Path,
    config: &SegmentConfig,
) -> Result<Vec<SegmentOutput>> {
    let deadline = Instant::now() + Duration::from_secs(config.plan_time_budget_secs);

    let schedule = candidate_durations(config);
    let mut last_attempt: Option<Vec<SegmentOutput>> = None;
    let mut best_oversize_count: Option<usize> = None;

    for duration in schedule {
        if Instant::now() >= deadline {
            debug!(%video_id, duration, "plan time budget exhausted, stopping search");
            break;
        }

        let segments = driver
            .segment(input, out_dir, duration)
            .await
            .map_err(Into::<Error>::into)?;

        let oversize = segments
            .iter()
            .filter(|s| s.byte_size > config.max_segment_bytes)
            .count();

        if oversize == 0 {
            return Ok(segments);
        }

        warn!(%video_id, duration, oversize, "segment plan has oversize segments, retrying finer");

        // Remember the candidate that minimizes oversize count; since the
        // schedule walks coarsest-to-finest, a strict improvement is the
        // only thing that should replace it, so a tie keeps the larger `d`
        // already held in `last_attempt`.
        if best_oversize_count.map_or(true, |best| oversize < best) {
            if let Some(previous) = last_attempt.take() {
                clear_segments(&previous).await;
            }
            best_oversize_count = Some(oversize);
            last_attempt = Some(segments);
        } else {
            clear_segments(&segments).await;
        }
    }

    let segments = last_attempt.ok_or_else(|| {
        Error::plan_oversize(video_id.as_str(), "no candidate duration produced any segments")
    })?;

    reencode_oversized(driver, video_id, out_dir, segments, config).await
}

fn candidate_durations(config: &SegmentConfig) -> Vec<f64> {
    let filtered: Vec<f64> = DURATION_SCHEDULE_SECS
        .iter()
        .copied()
        .filter(|d| *d <= config.max_segment_duration && *d >= config.min_segment_duration)
        .collect();

    if filtered.is_empty() {
        vec![config.max_segment_duration.max(config.min_segment_duration)]
    } else {
        filtered
    }
}

async fn clear_segments(segments: &[SegmentOutput]) {
    for segment in segments {
        let _ = tokio::fs::remove_file(&segment.path).await;
    }
}

/// Reencode every still-oversized segment at a bitrate sized to the byte
/// cap. If a reencoded segment is still oversized, split it into two
/// sub-segments at half the duration exactly once; a segment oversized
/// after that returns [`Error::PlanOversize`].
async fn reencode_oversized(
    driver: &dyn TranscoderDriver,
    video_id: &VideoId,
    out_dir: &Path,
    segments: Vec<SegmentOutput>,
    config: &SegmentConfig,
) -> Result<Vec<SegmentOutput>> {
    let mut result = Vec::with_capacity(segments.len());

    for segment in segments {
        if segment.byte_size <= config.max_segment_bytes {
            result.push(segment);
            continue;
        }

        let reencoded = reencode_one(driver, video_id, out_dir, &segment, config).await?;
        result.extend(reencoded);
    }

    renumber(&mut result);
    Ok(result)
}

async fn reencode_one(
    driver: &dyn TranscoderDriver,
    video_id: &VideoId,
    out_dir: &Path,
    segment: &SegmentOutput,
    config: &SegmentConfig,
) -> Result<Vec<SegmentOutput>> {
    let target_bitrate = reencode_bitrate(config.max_segment_bytes, segment.duration_secs);
    let output_path = out_dir.join(format!("{:05}-re.ts", segment.ordinal));

    let reencoded = driver
        .reencode(&segment.path, &output_path, target_bitrate)
        .await
        .map_err(Into::<Error>::into)?;

    if reencoded.byte_size <= config.max_segment_bytes {
        let _ = tokio::fs::remove_file(&segment.path).await;
        return Ok(vec![SegmentOutput { ordinal: segment.ordinal, ..reencoded }]);
    }

    warn!(
        %video_id,
        ordinal = segment.ordinal,
        byte_size = reencoded.byte_size,
        "reencoded segment still oversize, halving duration once"
    );

    let half_dir = out_dir.join(format!("{:05}-split", segment.ordinal));
    let half_secs = (segment.duration_secs / 2.0).max(0.5);
    let split = driver
        .segment(&segment.path, &half_dir, half_secs)
        .await
        .map_err(Into::<Error>::into)?;

    if split.iter().any(|s| s.byte_size > config.max_segment_bytes) {
        return Err(Error::plan_oversize(
            video_id.as_str(),
            format!("segment {} still exceeds cap after reencode and split", segment.ordinal),
        ));
    }

    let _ = tokio::fs::remove_file(&segment.path).await;
    let _ = tokio::fs::remove_file(&output_path).await;
    Ok(split)
}

fn reencode_bitrate(max_segment_bytes: u64, duration_secs: f64) -> u64 {
    let duration_secs = duration_secs.max(0.1);
    let target_bits = max_segment_bytes as f64 * 8.0 * REENCODE_TARGET_FRACTION;
    (target_bits / duration_secs) as u64
}

fn renumber(segments: &mut [SegmentOutput]) {
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.ordinal = i as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use vaultcast_transcode::{AudioTrack, VideoTrack};

    struct StubDriver {
        /// byte sizes to hand out on each successive `segment` call
        plans: Mutex<Vec<Vec<u64>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscoderDriver for StubDriver {
        async fn probe(&self, _input: &Path) -> vaultcast_transcode::Result<MediaInfo> {
            unimplemented!()
        }

        async fn segment(
            &self,
            _input: &Path,
            _out_dir: &Path,
            duration_secs: f64,
        ) -> vaultcast_transcode::Result<Vec<SegmentOutput>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let sizes = self.plans.lock().unwrap()[call].clone();
            Ok(sizes
                .into_iter()
                .enumerate()
                .map(|(i, byte_size)| SegmentOutput {
                    ordinal: i as u32,
                    path: PathBuf::from(format!("/tmp/{i:05}.ts")),
                    duration_secs,
                    byte_size,
                })
                .collect())
        }

        async fn reencode(
            &self,
            _input: &Path,
            output: &Path,
            _target_bitrate_bps: u64,
        ) -> vaultcast_transcode::Result<SegmentOutput> {
            Ok(SegmentOutput { ordinal: 0, path: output.to_path_buf(), duration_secs: 10.0, byte_size: 500 })
        }
    }

    fn config() -> SegmentConfig {
        SegmentConfig {
            max_segment_bytes: 1_000,
            min_segment_duration: 2.0,
            max_segment_duration: 30.0,
            plan_time_budget_secs: 60,
        }
    }

    #[tokio::test]
    async fn accepts_first_duration_with_no_oversize() {
        let driver = StubDriver { plans: Mutex::new(vec![vec![500, 600, 700]]), calls: AtomicUsize::new(0) };
        let video_id = VideoId::new("sample");
        let segments = plan(&driver, &video_id, Path::new("in.mp4"), Path::new("/tmp/out"), &config())
            .await
            .unwrap();
        assert_eq!(segments.len(), 3);
    }

    #[tokio::test]
    async fn remembers_the_duration_minimizing_oversize_count() {
        // Every candidate is oversize, but the third one (duration 20.0)
        // produces fewer oversize segments than the rest; the planner must
        // carry that attempt into reencode, not whichever ran last.
        let mut plans = vec![vec![1_500, 1_500, 1_500, 500]; 10];
        plans[2] = vec![1_500, 500];
        let driver = StubDriver { plans: Mutex::new(plans), calls: AtomicUsize::new(0) };
        let video_id = VideoId::new("sample");
        let segments = plan(&driver, &video_id, Path::new("in.mp4"), Path::new("/tmp/out"), &config())
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_reencode_when_schedule_exhausted() {
        let oversize_everywhere: Vec<Vec<u64>> = (0..10).map(|_| vec![5_000]).collect();
        let driver = StubDriver { plans: Mutex::new(oversize_everywhere), calls: AtomicUsize::new(0) };
        let video_id = VideoId::new("sample");
        let segments = plan(&driver, &video_id, Path::new("in.mp4"), Path::new("/tmp/out"), &config())
            .await
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].byte_size <= 1_000);
    }

    fn media_info(video_codec: &str, audio_codec: &str) -> MediaInfo {
        MediaInfo {
            file_path: PathBuf::from("in.mp4"),
            file_size: 100,
            container: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: None,
            bit_rate: Some(4_000_000),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: video_codec.to_string(),
                width: 1920,
                height: 1080,
                frame_rate: Some(24.0),
            }],
            audio_tracks: vec![AudioTrack {
                index: 0,
                codec: audio_codec.to_string(),
                channels: 2,
                sample_rate: Some(48_000),
                language: None,
                default: true,
            }],
            subtitle_tracks: vec![],
        }
    }

    #[test]
    fn compatible_codecs_do_not_need_full_transcode() {
        assert!(!needs_full_transcode(&media_info("h264", "aac")));
        assert!(!needs_full_transcode(&media_info("hevc", "mp3")));
    }

    #[test]
    fn incompatible_video_codec_needs_full_transcode() {
        assert!(needs_full_transcode(&media_info("vp9", "aac")));
    }

    #[test]
    fn incompatible_audio_codec_needs_full_transcode() {
        assert!(needs_full_transcode(&media_info("h264", "opus")));
    }
}
