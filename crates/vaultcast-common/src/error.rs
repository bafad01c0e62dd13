//! The catalog-wide error type.
//!
//! Every variant corresponds to one of the error kinds named in the ingest
//! and playback paths. `kind()` returns the stable wire name used in the
//! JSON error body (`{"error": "<kind>", "detail": "..."}`); the HTTP layer
//! maps each variant to a status code.

/// Catalog-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The transcoder driver's probe step failed.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// A segment/reencode subprocess failed; carries captured stderr.
    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    /// The planner could not produce a segment within the byte cap.
    #[error("planner could not satisfy size cap for {video_id}: {detail}")]
    PlanOversize { video_id: String, detail: String },

    /// Upload to the remote platform failed after exhausting retries.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A download from the remote platform exceeded its timeout.
    #[error("fetch timed out: {0}")]
    FetchTimeout(String),

    /// A download from the remote platform failed for a non-timeout reason.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The account recorded for a segment is not configured or failed a ping.
    #[error("account unavailable: {0}")]
    AccountUnavailable(String),

    /// Unknown `video_id`, `ordinal`, or other lookup miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invariant was violated (e.g. an ordinal gap discovered at read time).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// An ingest was requested for a `video_id` already being ingested.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller supplied invalid input (bad multipart body, bad query params, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error with no more specific kind.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire name used as the `"error"` field of the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
            Self::ProbeFailed(_) => "PROBE_FAILED",
            Self::TranscodeFailed(_) => "TRANSCODE_FAILED",
            Self::PlanOversize { .. } => "PLAN_OVERSIZE",
            Self::UploadFailed(_) => "UPLOAD_FAILED",
            Self::FetchTimeout(_) => "FETCH_TIMEOUT",
            Self::FetchFailed(_) => "FETCH_FAILED",
            Self::AccountUnavailable(_) => "ACCOUNT_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn plan_oversize(video_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PlanOversize {
            video_id: video_id.into(),
            detail: detail.into(),
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Result type alias using the catalog's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_wire_name() {
        assert_eq!(Error::AccountUnavailable("x".into()).kind(), "ACCOUNT_UNAVAILABLE");
        assert_eq!(Error::not_found("x").kind(), "NOT_FOUND");
        assert_eq!(
            Error::plan_oversize("v1", "still oversize after halving").kind(),
            "PLAN_OVERSIZE"
        );
    }

    #[test]
    fn display_carries_detail() {
        let err = Error::TranscodeFailed("exit code 1: bad codec".into());
        assert_eq!(err.to_string(), "transcode failed: exit code 1: bad codec");
    }
}
