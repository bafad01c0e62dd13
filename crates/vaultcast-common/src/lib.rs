//! Shared error types, typed IDs, and status enums used across the vaultcast
//! workspace: the metadata store, transcoder driver, blob client, and the
//! server crate all depend on this crate rather than on each other.

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::{AccountId, VideoId};
pub use types::VideoStatus;
