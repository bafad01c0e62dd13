//! Ingest job record: the struct backing both `/api/upload/{job}/progress`
//! and the `AppEvent` stream.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestPhase {
    Receiving,
    Probing,
    Planning,
    Uploading,
    Committing,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: String,
    pub original_filename: String,
    pub phase: IngestPhase,
    pub current_bytes: u64,
    pub total_bytes: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

impl IngestJob {
    pub fn new(id: String, original_filename: String) -> Self {
        Self {
            id,
            original_filename,
            phase: IngestPhase::Receiving,
            current_bytes: 0,
            total_bytes: 0,
            started_at: chrono::Utc::now(),
            error: None,
        }
    }

    /// Bytes/sec since the job started; `None` if no time has elapsed yet.
    pub fn rate_bps(&self) -> Option<f64> {
        let elapsed = (chrono::Utc::now() - self.started_at).num_milliseconds();
        if elapsed <= 0 {
            return None;
        }
        Some(self.current_bytes as f64 / (elapsed as f64 / 1000.0))
    }

    /// Estimated seconds remaining, or `None` if rate/total are unknown.
    pub fn eta_secs(&self) -> Option<f64> {
        let rate = self.rate_bps()?;
        if rate <= 0.0 || self.total_bytes < self.current_bytes {
            return None;
        }
        Some((self.total_bytes - self.current_bytes) as f64 / rate)
    }
}
