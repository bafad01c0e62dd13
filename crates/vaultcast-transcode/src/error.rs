//! Error types for the transcoder driver.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("workspace error: {0}")]
    Workspace(String),
}

impl Error {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed { tool: tool.into(), message: message.into() }
    }

    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError { tool: tool.into(), message: message.into() }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}

impl From<Error> for vaultcast_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::ToolNotFound { tool } => {
                vaultcast_common::Error::ProbeFailed(format!("tool not found: {tool}"))
            }
            Error::ToolFailed { tool, message } => {
                vaultcast_common::Error::TranscodeFailed(format!("{tool}: {message}"))
            }
            Error::ParseError { tool, message } => {
                vaultcast_common::Error::ProbeFailed(format!("{tool}: {message}"))
            }
            Error::FileNotFound { path } => {
                vaultcast_common::Error::NotFound(path.display().to_string())
            }
            Error::Io(e) => vaultcast_common::Error::Internal(e.to_string()),
            Error::Json(e) => vaultcast_common::Error::ProbeFailed(e.to_string()),
            Error::InvalidInput(s) => vaultcast_common::Error::InvalidInput(s),
            Error::Unsupported(s) => vaultcast_common::Error::TranscodeFailed(s),
            Error::Workspace(s) => vaultcast_common::Error::Internal(s),
        }
    }
}
