//! Crate-wide error taxonomy
//!
//! Validation happens at the mutation boundary before any state transition;
//! once a mutation is accepted it cannot partially fail. Persistence errors
//! never roll back an already-applied in-memory change.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad user input (empty object code, malformed import, out-of-range
    /// rating). Surfaced immediately, no state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Object code collision (case-insensitive).
    #[error("duplicate object code: {0}")]
    Duplicate(String),

    /// Referenced object/project/panel/session no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Local sink capacity exceeded; the write was skipped, not truncated.
    #[error("local storage quota exceeded: payload is {size} bytes, limit {limit}")]
    StorageQuota { size: usize, limit: usize },

    /// Remote load or save failure. Load failures fall back to an empty
    /// catalog; save failures leave pending state intact for retry.
    #[error("remote sync failed: {0}")]
    RemoteSync(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
