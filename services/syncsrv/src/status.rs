//! Shared state between the sync loop and its observers
//!
//! The loop is the only writer; API handlers only read. Cycle progress is
//! mirrored into a bounded ring of log lines so the control surface can
//! show recent activity without touching the log files.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::types::CycleStats;

/// Maximum entries kept in the log ring; older lines are dropped.
const LOG_CAPACITY: usize = 100;

/// Loop state as shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncState {
    Stopped,
    Running,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
        }
    }
}

/// One timestamped line in the status ring.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Default)]
struct Inner {
    logs: VecDeque<LogEntry>,
    stats: CycleStats,
}

/// Running flag, bounded log ring and last-cycle stats in one place.
///
/// This is the only state the loop shares with the rest of the process;
/// everything else lives in the stores.
#[derive(Default)]
pub struct SyncStatus {
    running: AtomicBool,
    inner: Mutex<Inner>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the loop running and clear state left from the previous run.
    pub fn mark_started(&self) {
        let mut inner = self.inner.lock();
        inner.logs.clear();
        inner.stats = CycleStats::default();
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn push_log(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.logs.len() == LOG_CAPACITY {
            inner.logs.pop_front();
        }
        inner.logs.push_back(LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn record_cycle(&self, stats: CycleStats) {
        self.inner.lock().stats = stats;
    }

    pub fn record_error(&self, message: &str) {
        self.inner.lock().stats.last_error = Some(message.to_string());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        if self.is_running() {
            SyncState::Running
        } else {
            SyncState::Stopped
        }
    }

    /// Snapshot of the log ring, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().logs.iter().cloned().collect()
    }

    pub fn stats(&self) -> CycleStats {
        self.inner.lock().stats.clone()
    }
}
