//! Error type shared by the library and the CLI.

use std::io;

use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;
use crate::types::RegionId;

/// Result alias used throughout the consolidator.
pub type Result<T> = std::result::Result<T, ConsolidationError>;

/// Errors surfaced by the consolidation engine and its collaborators.
///
/// Bookkeeping desynchronization is not represented here: it panics, because
/// the traversal state cannot be trusted afterwards.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Encoding or decoding of a persisted value failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The region graph does not know the requested region.
    #[error("region {0} not found")]
    UnknownRegion(RegionId),
    /// A cache, store or geography collaborator failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
    /// A caller supplied an argument the engine cannot use.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Configuration could not be loaded or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<serde_json::Error> for ConsolidationError {
    fn from(err: serde_json::Error) -> Self {
        ConsolidationError::Serialization(err.to_string())
    }
}

impl ConsolidationError {
    pub(crate) fn collaborator(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(%message, "collaborator.failure");
        ConsolidationError::Collaborator(message)
    }
}
