//! Master/media playlist rendering.
//!
//! Both playlist types are rendered by appending to a `String` with
//! `std::fmt::Write`; no intermediate allocation per line, and no error path
//! since writing to a `String` never fails.

use std::fmt::Write;

/// One subtitle track's `EXT-X-MEDIA` entry in the master playlist.
#[derive(Debug, Clone)]
pub struct SubtitleInfo {
    pub group_id: String,
    pub name: String,
    pub language: Option<String>,
    pub uri: String,
    pub is_default: bool,
    pub is_forced: bool,
}

/// A single video (optionally + audio) variant in the master playlist.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub uri: String,
    /// Approximate bandwidth in bits per second (average byte size / duration * 8).
    pub bandwidth: u64,
    /// RFC 6381 codec string, e.g. `"avc1.640028,mp4a.40.2"`. Best-effort: the
    /// planner only knows the source/target codec names, not exact profile tags.
    pub codecs: Option<String>,
    pub subtitle_group: Option<String>,
}

/// Master playlist: exactly one video variant plus subtitle media entries.
#[derive(Debug, Clone, Default)]
pub struct MasterPlaylist {
    pub stream: Option<StreamInfo>,
    pub subtitles: Vec<SubtitleInfo>,
}

impl MasterPlaylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: StreamInfo) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_subtitle(mut self, subtitle: SubtitleInfo) -> Self {
        self.subtitles.push(subtitle);
        self
    }

    /// Render to an `.m3u8` string. A pure function of `self`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(out, "#EXTM3U").unwrap();
        writeln!(out, "#EXT-X-VERSION:3").unwrap();

        for sub in &self.subtitles {
            write!(
                out,
                "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"{}\",NAME=\"{}\",URI=\"{}\"",
                sub.group_id, sub.name, sub.uri
            )
            .unwrap();
            if let Some(lang) = &sub.language {
                write!(out, ",LANGUAGE=\"{lang}\"").unwrap();
            }
            write!(
                out,
                ",DEFAULT={},FORCED={}",
                if sub.is_default { "YES" } else { "NO" },
                if sub.is_forced { "YES" } else { "NO" }
            )
            .unwrap();
            writeln!(out).unwrap();
        }

        if let Some(stream) = &self.stream {
            write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", stream.bandwidth).unwrap();
            if let Some(codecs) = &stream.codecs {
                write!(out, ",CODECS=\"{codecs}\"").unwrap();
            }
            if let Some(group) = &stream.subtitle_group {
                write!(out, ",SUBTITLES=\"{group}\"").unwrap();
            }
            writeln!(out).unwrap();
            writeln!(out, "{}", stream.uri).unwrap();
        }

        out
    }
}

/// One segment entry of a media playlist.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    pub duration_secs: f64,
    pub uri: String,
}

/// Media playlist: VOD, dense ordinal-ordered segment list, terminated.
#[derive(Debug, Clone, Default)]
pub struct MediaPlaylist {
    pub segments: Vec<SegmentEntry>,
}

impl MediaPlaylist {
    pub fn new(segments: Vec<SegmentEntry>) -> Self {
        Self { segments }
    }

    fn target_duration(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.duration_secs.ceil() as u64)
            .max()
            .unwrap_or(0)
    }

    /// Render to an `.m3u8` string per the media-playlist contract:
    /// `EXT-X-VERSION:3`, `EXT-X-TARGETDURATION` = ceil(max segment duration),
    /// `EXT-X-MEDIA-SEQUENCE:0`, one `EXTINF`+URI pair per segment in ordinal
    /// order, terminated with `EXT-X-ENDLIST`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(out, "#EXTM3U").unwrap();
        writeln!(out, "#EXT-X-VERSION:3").unwrap();
        writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration()).unwrap();
        writeln!(out, "#EXT-X-MEDIA-SEQUENCE:0").unwrap();

        for segment in &self.segments {
            writeln!(out, "#EXTINF:{:.6},", segment.duration_secs).unwrap();
            writeln!(out, "{}", segment.uri).unwrap();
        }

        writeln!(out, "#EXT-X-ENDLIST").unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_playlist_targets_the_longest_segment() {
        let playlist = MediaPlaylist::new(vec![
            SegmentEntry { duration_secs: 5.5, uri: "0.ts".into() },
            SegmentEntry { duration_secs: 6.2, uri: "1.ts".into() },
        ]);
        let m3u8 = playlist.render();
        assert!(m3u8.contains("#EXT-X-TARGETDURATION:7"));
        assert!(m3u8.contains("#EXT-X-MEDIA-SEQUENCE:0"));
        assert!(m3u8.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn media_playlist_preserves_ordinal_order() {
        let playlist = MediaPlaylist::new(vec![
            SegmentEntry { duration_secs: 5.0, uri: "0.ts".into() },
            SegmentEntry { duration_secs: 5.0, uri: "1.ts".into() },
            SegmentEntry { duration_secs: 5.0, uri: "2.ts".into() },
        ]);
        let m3u8 = playlist.render();
        let idx0 = m3u8.find("0.ts").unwrap();
        let idx1 = m3u8.find("1.ts").unwrap();
        let idx2 = m3u8.find("2.ts").unwrap();
        assert!(idx0 < idx1 && idx1 < idx2);
    }

    #[test]
    fn rendering_is_deterministic() {
        let playlist = MediaPlaylist::new(vec![SegmentEntry { duration_secs: 4.0, uri: "0.ts".into() }]);
        assert_eq!(playlist.render(), playlist.render());
    }

    #[test]
    fn master_playlist_includes_subtitle_media_entries() {
        let master = MasterPlaylist::new()
            .with_stream(StreamInfo {
                uri: "video/playlist.m3u8".into(),
                bandwidth: 5_000_000,
                codecs: Some("avc1.640028,mp4a.40.2".into()),
                subtitle_group: Some("subs".into()),
            })
            .with_subtitle(SubtitleInfo {
                group_id: "subs".into(),
                name: "English".into(),
                language: Some("eng".into()),
                uri: "subtitles/eng".into(),
                is_default: true,
                is_forced: false,
            });

        let m3u8 = master.render();
        assert!(m3u8.contains("TYPE=SUBTITLES"));
        assert!(m3u8.contains("LANGUAGE=\"eng\""));
        assert!(m3u8.contains("SUBTITLES=\"subs\""));
        assert!(m3u8.contains("BANDWIDTH=5000000"));
    }
}
