//! HLS playlist generation from catalog metadata rows.
//!
//! This crate is a pure function of `(video metadata, chosen base URL) -> String`:
//! it holds no state and performs no I/O. The server crate passes it the rows
//! it already read from the metadata store.

pub mod hls;

pub use hls::{MasterPlaylist, MediaPlaylist, SegmentEntry, StreamInfo, SubtitleInfo};
