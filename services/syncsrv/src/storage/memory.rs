//! In-memory store implementations for testing
//!
//! Both stores honor the same contracts as the SQLite backends, plus an
//! injectable failure so error paths can be driven deterministically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{DestinationStore, SourceStore};
use crate::error::{Result, SyncError};
use crate::types::{truncate_to_second, Reading, WideRow};

/// In-memory readings source.
#[derive(Default)]
pub struct MemorySourceStore {
    readings: Mutex<Vec<Reading>>,
    fail_with: Mutex<Option<String>>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reading: Reading) {
        self.readings.lock().push(reading);
    }

    pub fn extend(&self, batch: Vec<Reading>) {
        self.readings.lock().extend(batch);
    }

    /// Make every subsequent fetch fail, simulating an unreachable source.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_with.lock() = None;
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Reading>> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(SyncError::SourceUnreachable(message));
        }

        // Normalize to whole seconds before filtering, so the watermark
        // comparison and the group boundaries below see the same bucketed
        // instants the destination keys on.
        let mut newer: Vec<Reading> = self
            .readings
            .lock()
            .iter()
            .map(|r| Reading {
                timestamp: truncate_to_second(r.timestamp),
                ..r.clone()
            })
            .filter(|r| r.timestamp > since)
            .collect();
        // Stable sort keeps insertion order within a timestamp
        newer.sort_by_key(|r| r.timestamp);

        // Take whole timestamp groups until the chunk is full; an oversized
        // first group is delivered whole, mirroring the SQLite backend.
        let mut out: Vec<Reading> = Vec::new();
        let mut iter = newer.into_iter().peekable();
        while let Some(first) = iter.next() {
            let group_ts = first.timestamp;
            let mut group = vec![first];
            while let Some(next) = iter.peek() {
                if next.timestamp == group_ts {
                    group.extend(iter.next());
                } else {
                    break;
                }
            }
            if !out.is_empty() && out.len() + group.len() > limit {
                break;
            }
            out.extend(group);
            if out.len() >= limit {
                break;
            }
        }

        Ok(out)
    }
}

/// In-memory wide-row destination.
#[derive(Default)]
pub struct MemoryDestinationStore {
    rows: Mutex<BTreeMap<DateTime<Utc>, Vec<Option<f64>>>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryDestinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, simulating an unreachable destination.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_with.lock() = None;
    }

    /// Snapshot of all persisted rows in timestamp order.
    pub fn rows(&self) -> Vec<WideRow> {
        self.rows
            .lock()
            .iter()
            .map(|(timestamp, values)| WideRow {
                timestamp: *timestamp,
                values: values.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl DestinationStore for MemoryDestinationStore {
    async fn last_synced(&self) -> Result<Option<DateTime<Utc>>> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(SyncError::DestinationUnreachable(message));
        }
        Ok(self.rows.lock().keys().next_back().copied())
    }

    async fn write(&self, rows: &[WideRow]) -> Result<u64> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(SyncError::DestinationUnreachable(message));
        }
        let mut store = self.rows.lock();
        for row in rows {
            store.insert(row.timestamp, row.values.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }
}
