//! Destination-derived high-water mark
//!
//! The sync keeps no bookkeeping of its own: the highest timestamp already
//! persisted in the destination IS the progress marker. A crash between
//! fetch and write leaves the mark where the last commit put it, so the
//! next run simply re-covers the gap.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::storage::DestinationStore;

/// Mark used when the destination holds no rows yet; the first cycle then
/// fetches the entire source history.
pub const EPOCH_SENTINEL: DateTime<Utc> = DateTime::UNIX_EPOCH;

/// Current high-water mark: `max(timestamp)` over persisted wide rows, or
/// the epoch sentinel for an empty destination.
///
/// Only "nothing persisted yet" produces the sentinel. A store failure
/// propagates untouched, because treating a transient fault as an empty
/// destination would re-sync all of history into a table that may be fine.
pub async fn current<D: DestinationStore>(destination: &D) -> Result<DateTime<Utc>> {
    Ok(destination.last_synced().await?.unwrap_or(EPOCH_SENTINEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::storage::memory::MemoryDestinationStore;
    use crate::types::WideRow;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_empty_destination_yields_epoch() {
        let dest = MemoryDestinationStore::new();

        assert_eq!(current(&dest).await.unwrap(), EPOCH_SENTINEL);
    }

    #[tokio::test]
    async fn test_mark_is_max_persisted_timestamp() {
        let dest = MemoryDestinationStore::new();
        let t1 = Utc.timestamp_opt(100, 0).unwrap();
        let t2 = Utc.timestamp_opt(200, 0).unwrap();
        dest.write(&[
            WideRow {
                timestamp: t2,
                values: vec![Some(1.0)],
            },
            WideRow {
                timestamp: t1,
                values: vec![Some(2.0)],
            },
        ])
        .await
        .unwrap();

        assert_eq!(current(&dest).await.unwrap(), t2);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_an_empty_destination() {
        let dest = MemoryDestinationStore::new();
        dest.fail_with("connection refused");

        let err = current(&dest).await.unwrap_err();
        assert!(matches!(err, SyncError::DestinationUnreachable(_)));
    }
}
