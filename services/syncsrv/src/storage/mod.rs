//! Store contracts for the sync engine
//!
//! The engine only ever talks to these traits, so the SQLite backends can
//! be swapped for in-memory ones in tests, or for other databases later.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Reading, WideRow};

/// Read side of the pipeline.
///
/// Implementations:
/// - `SqliteSourceStore`: production SQLite backend
/// - `MemorySourceStore`: in-memory backend for testing
#[async_trait]
pub trait SourceStore: Send + Sync + 'static {
    /// Fetch readings with `timestamp > since`, ordered ascending by
    /// timestamp with stable order within a timestamp.
    ///
    /// Returned timestamps are normalized to whole seconds, so the `since`
    /// comparison and the grouping below both operate on bucketed instants
    /// and a second never straddles a chunk boundary.
    ///
    /// `limit` bounds one chunk, with one exception: a returned batch never
    /// ends in the middle of a timestamp group, and a single group larger
    /// than `limit` is returned whole. An empty result means the source has
    /// nothing newer than `since`.
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Reading>>;
}

/// Write side of the pipeline.
///
/// Implementations:
/// - `SqliteDestinationStore`: production SQLite backend
/// - `MemoryDestinationStore`: in-memory backend for testing
#[async_trait]
pub trait DestinationStore: Send + Sync + 'static {
    /// Highest timestamp already persisted, or `None` when no wide rows
    /// exist yet (including the table not having been created at all).
    /// Any other failure propagates; a transient fault must never be
    /// mistaken for an empty destination.
    async fn last_synced(&self) -> Result<Option<DateTime<Utc>>>;

    /// Upsert wide rows keyed on timestamp, atomically per batch.
    ///
    /// Re-delivering a timestamp replaces its values instead of failing,
    /// which makes overlapping deliveries safe to repeat.
    async fn write(&self, rows: &[WideRow]) -> Result<u64>;

    /// Create the destination table if it does not exist. Called once at
    /// startup, never from the recurring sync cycle.
    async fn ensure_schema(&self) -> Result<()>;
}
