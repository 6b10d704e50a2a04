//! The sync loop: watermark, fetch, pivot, write, sleep, repeat

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::pivot;
use crate::status::SyncStatus;
use crate::storage::{DestinationStore, SourceStore};
use crate::tags::TagDictionary;
use crate::types::CycleStats;
use crate::watermark;

/// Orchestrates sync cycles over a source/destination pair.
///
/// The engine is fail-stop: the first error of any cycle ends the loop and
/// nothing retries in the background. Because the watermark is re-derived
/// from the destination on every cycle, restarting the loop later resumes
/// exactly where the last committed write left off.
pub struct SyncEngine<S: SourceStore, D: DestinationStore> {
    source: Arc<S>,
    destination: Arc<D>,
    dict: TagDictionary,
    status: Arc<SyncStatus>,
    poll_interval: Duration,
    chunk_size: usize,
}

impl<S: SourceStore, D: DestinationStore> SyncEngine<S, D> {
    pub fn new(
        source: Arc<S>,
        destination: Arc<D>,
        dict: TagDictionary,
        status: Arc<SyncStatus>,
        poll_interval: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            source,
            destination,
            dict,
            status,
            poll_interval,
            chunk_size,
        }
    }

    /// Run cycles until cancelled or a cycle fails.
    ///
    /// Cancellation is observed between cycles and between chunk fetches
    /// inside a draining cycle; the in-flight batch always finishes its
    /// write so no batch is torn by a shutdown.
    pub async fn run(&self, cancel: CancellationToken) {
        self.status.mark_started();
        self.status.push_log("sync started");
        info!("Sync loop started, interval {:?}", self.poll_interval);

        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_cycle(&cancel).await {
                        Ok(stats) => {
                            if stats.rows_fetched == 0 {
                                self.status.push_log("no new data");
                            } else {
                                self.status.push_log(format!(
                                    "cycle complete: fetched {} readings, wrote {} wide rows",
                                    stats.rows_fetched, stats.rows_written
                                ));
                            }
                            self.status.record_cycle(stats);
                        }
                        Err(e) => {
                            error!("Sync cycle failed: {}", e);
                            self.status.push_log(format!("sync stopped: {e}"));
                            self.status.record_error(&e.to_string());
                            break;
                        }
                    }
                }
                () = cancel.cancelled() => {
                    info!("Sync loop received stop signal");
                    self.status.push_log("sync stopped");
                    break;
                }
            }
        }

        self.status.mark_stopped();
        info!("Sync loop terminated");
    }

    /// One watermark-bounded pass over the source.
    ///
    /// Chunked fetches repeat until the source has nothing newer, so a
    /// large backlog drains in a single cycle with bounded memory. Each
    /// chunk commits on its own; the destination-derived watermark makes a
    /// failure between chunks safe to resume from.
    pub async fn run_once(&self) -> Result<CycleStats> {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// Cycle body. `cancel` is checked before every chunk fetch so a stop
    /// request does not have to wait for a long backfill to drain; the
    /// committed chunks stand and the watermark resumes after them.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleStats> {
        let mut stats = CycleStats::default();
        let mut since = watermark::current(self.destination.as_ref()).await?;
        debug!("Cycle start, watermark {}", since);

        loop {
            if cancel.is_cancelled() {
                debug!("Stop requested, ending cycle after {} readings", stats.rows_fetched);
                break;
            }
            let readings = self.source.fetch_since(since, self.chunk_size).await?;
            if readings.is_empty() {
                break;
            }
            stats.rows_fetched += readings.len() as u64;
            if let Some(last) = readings.last() {
                since = last.timestamp;
            }

            let outcome = pivot::pivot(&readings, &self.dict);
            stats.rows_filtered += outcome.unknown_dropped;
            if outcome.duplicates_dropped > 0 {
                debug!("Dropped {} duplicate readings", outcome.duplicates_dropped);
            }
            if outcome.rows.is_empty() {
                // Every reading was unknown; nothing to write, keep draining
                continue;
            }

            let written = self.destination.write(&outcome.rows).await?;
            stats.rows_written += written;
        }

        if stats.rows_fetched == 0 {
            info!("No new data");
        } else {
            info!(
                "Cycle complete: fetched {}, filtered {}, wrote {}",
                stats.rows_fetched, stats.rows_filtered, stats.rows_written
            );
        }
        stats.last_success = Some(Utc::now());
        Ok(stats)
    }
}
