//! Derivation of a stable textual `video_id` from a source filename.
//!
//! The catalog coordinator calls [`sanitize_stem`] once per ingest to get a
//! candidate id, then appends a numeric suffix via [`collision_suffix`] if
//! that id is already taken.

use std::path::Path;

/// Lowercase the filename stem, replace anything that isn't `[a-z0-9_-]`
/// with `-`, and collapse repeated separators.
///
/// # Examples
///
/// ```
/// use vaultcast_common::paths::sanitize_stem;
/// use std::path::Path;
///
/// assert_eq!(sanitize_stem(Path::new("Sample 60s (10Mbps).mp4")), "sample-60s-10mbps");
/// assert_eq!(sanitize_stem(Path::new("already-clean.mkv")), "already-clean");
/// ```
pub fn sanitize_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");

    let mut out = String::with_capacity(stem.len());
    let mut last_was_sep = false;
    for ch in stem.chars().flat_map(|c| c.to_lowercase()) {
        let keep = ch.is_ascii_alphanumeric() || ch == '_' || ch == '-';
        if keep {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append a `-{n}` suffix to a candidate id for collision resolution.
///
/// # Examples
///
/// ```
/// use vaultcast_common::paths::collision_suffix;
///
/// assert_eq!(collision_suffix("clip", 2), "clip-2");
/// ```
pub fn collision_suffix(base: &str, n: u32) -> String {
    format!("{base}-{n}")
}
