//! M3U8 playlist generation.

mod playlist;

pub use playlist::{MasterPlaylist, MediaPlaylist, SegmentEntry, StreamInfo, SubtitleInfo};
