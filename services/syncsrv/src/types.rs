//! Core data rows exchanged between the stores and the transformer

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

/// Truncate a timestamp to whole seconds.
///
/// Wide rows are keyed on whole seconds. Readings are normalized this way
/// as they leave a source store, so chunk grouping, watermark comparisons
/// and pivot dedup all operate on the same bucketed instants.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// One narrow row from the source store: a single tag sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub tag_index: u32,
    /// Sampled value; sources may record explicit nulls
    pub value: Option<f64>,
}

/// One pivoted destination row.
///
/// `values` is aligned with the dictionary's column order; a tag with no
/// reading at this timestamp holds `None` so every row spans the full
/// column set.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

/// Counters for the most recent sync cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    /// Narrow readings fetched from the source
    pub rows_fetched: u64,
    /// Readings dropped because their tag is not in the dictionary
    pub rows_filtered: u64,
    /// Wide rows upserted into the destination
    pub rows_written: u64,
    /// Completion time of the last successful cycle
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the error that stopped the loop, if any
    pub last_error: Option<String>,
}
