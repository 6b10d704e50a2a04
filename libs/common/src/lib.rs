//! Shared base library for the sync services
//!
//! Provides the pieces every service needs, including:
//! - `SQLite` pool wrapper
//! - logging setup
//! - graceful shutdown handling

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Common modules
pub mod logging;
pub mod shutdown;

// Re-export the SQLite client at crate root for convenience
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteClient, SqlitePool};

// Re-export common dependencies
pub use anyhow;
pub use tokio;
