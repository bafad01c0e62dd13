//! Typed ID wrappers.
//!
//! `video_id` is a stable textual identifier derived from a filename (see
//! [`crate::paths::sanitize_stem`]), not a UUID — accounts are likewise
//! named by a plain string key from static configuration, so both newtypes
//! wrap `String` rather than `uuid::Uuid`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable textual identifier for a video, e.g. `sample-60s-10mbps`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier for one of the statically configured upload accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_round_trips_through_json() {
        let id = VideoId::new("sample-60s");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""sample-60s""#);
        let back: VideoId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn account_id_display() {
        let id = AccountId::new("acct-1");
        assert_eq!(id.to_string(), "acct-1");
    }

    #[test]
    fn video_ids_are_ordered_for_btreemap_use() {
        let a = VideoId::new("a");
        let b = VideoId::new("b");
        assert!(a < b);
    }
}
