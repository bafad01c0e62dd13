//! Core enums shared across the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a `videos` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Ingest is in progress; segments may be partial and are invisible to playlists.
    Processing,
    /// Ingest committed; the video participates in streaming.
    Active,
    /// Ingest failed unrecoverably; row retained for diagnostics.
    Error,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Active => write!(f, "active"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "active" => Ok(Self::Active),
            "error" => Ok(Self::Error),
            other => Err(format!("invalid video status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for status in [VideoStatus::Processing, VideoStatus::Active, VideoStatus::Error] {
            let s = status.to_string();
            assert_eq!(VideoStatus::from_str(&s).unwrap(), status);
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(VideoStatus::from_str("deleted").is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&VideoStatus::Active).unwrap(), r#""active""#);
    }
}
