//! syncsrv - incremental pivot-sync service
//!
//! Moves tag-indexed readings from a narrow source table into a wide,
//! timestamp-keyed destination table, one watermark-bounded batch at a time.
//! The destination itself records how far the sync has progressed, so a
//! restart resumes exactly after the last committed row.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod pivot;
pub mod status;
pub mod storage;
pub mod tags;
pub mod types;
pub mod watermark;

pub use config::Config;
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use status::{SyncState, SyncStatus};
pub use tags::TagDictionary;
pub use types::{CycleStats, Reading, WideRow};

/// Service information
pub const SERVICE_NAME: &str = "syncsrv";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
