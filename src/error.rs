//! Typed failures of the harvest core. The CLI and library entry points wrap these in `anyhow`.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("account '{account}' requires login")]
    UpstreamAuthRequired { account: String },

    #[error("account '{account}' not found")]
    UpstreamNotFound { account: String },

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("connection to source broken: {0}")]
    ConnectionBroken(String),

    #[error("corrupt checkpoint {}: {reason}", path.display())]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("checkpoint {} unreadable after {attempts} attempts: {source}", path.display())]
    CheckpointUnreadable {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {} not written after {attempts} attempts: {reason}", path.display())]
    CheckpointWriteFailed {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },

    #[error("cache {} not written: {reason}", path.display())]
    CacheWriteFailed { path: PathBuf, reason: String },

    #[error("extraction of {id} failed after {attempts} attempts: {reason}")]
    ExtractionFailed {
        id: EntityId,
        attempts: u32,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl HarvestError {
    /// Failures that end one account but let the run continue with the next.
    pub fn is_account_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::UpstreamAuthRequired { .. } | HarvestError::UpstreamNotFound { .. }
        )
    }
}

pub type HarvestResult<T> = std::result::Result<T, HarvestError>;
