//! Error types for the sync service

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures surfaced by a sync cycle or its collaborators.
///
/// Every variant is fatal to the running loop: the cycle aborts, the loop
/// stops, and nothing is written past the failure point. The watermark is
/// derived from the destination, so stopping early never loses progress.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("destination unreachable: {0}")]
    DestinationUnreachable(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
