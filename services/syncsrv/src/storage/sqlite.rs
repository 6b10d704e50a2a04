//! SQLite-backed source and destination stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SqliteClient, SqlitePool};
use tracing::debug;

use super::{DestinationStore, SourceStore};
use crate::error::{Result, SyncError};
use crate::tags::TagDictionary;
use crate::types::{Reading, WideRow};

/// Raw narrow row as stored: unix seconds, tag index, value.
type RawReading = (i64, i64, Option<f64>);

fn source_err(e: sqlx::Error) -> SyncError {
    SyncError::SourceUnreachable(e.to_string())
}

/// Classify a destination-side failure.
///
/// SQLite reports structural problems only through its error message, so
/// missing tables, missing columns and type mismatches are recognized there;
/// everything else counts as the destination being unreachable.
fn dest_err(e: sqlx::Error) -> SyncError {
    if let sqlx::Error::Database(ref db) = e {
        let msg = db.message();
        if msg.contains("no such table")
            || msg.contains("no such column")
            || msg.contains("has no column")
            || msg.contains("datatype mismatch")
        {
            return SyncError::SchemaMismatch(msg.to_string());
        }
    }
    SyncError::DestinationUnreachable(e.to_string())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> std::result::Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .bind(table)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Raw rows store INTEGER unix seconds, so decoded timestamps already
/// carry the whole-second normalization the `SourceStore` contract asks for.
fn decode_readings(raw: Vec<RawReading>) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(raw.len());
    for (ts, tag, value) in raw {
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            debug!("Skipping reading with out-of-range timestamp {}", ts);
            continue;
        };
        let Ok(tag_index) = u32::try_from(tag) else {
            // Cannot match any dictionary entry; same fate as an unknown tag
            debug!("Skipping reading with out-of-range tag index {}", tag);
            continue;
        };
        readings.push(Reading {
            timestamp,
            tag_index,
            value,
        });
    }
    readings
}

/// Narrow readings source backed by a SQLite file another process writes.
pub struct SqliteSourceStore {
    client: SqliteClient,
    table: String,
}

impl SqliteSourceStore {
    pub fn new(client: SqliteClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    /// Whether the readings table exists. Used by startup checks.
    pub async fn table_exists(&self) -> Result<bool> {
        table_exists(self.client.pool(), &self.table)
            .await
            .map_err(source_err)
    }

    /// Fetch every reading of one timestamp, for groups larger than a chunk.
    async fn fetch_group(&self, ts: i64) -> Result<Vec<RawReading>> {
        let sql = format!(
            "SELECT ts, tag_index, value FROM \"{}\" WHERE ts = ?1 ORDER BY rowid ASC",
            self.table
        );
        sqlx::query_as::<_, RawReading>(&sql)
            .bind(ts)
            .fetch_all(self.client.pool())
            .await
            .map_err(source_err)
    }
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    async fn fetch_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Reading>> {
        // One row of look-ahead tells us whether the last timestamp group
        // in the window might continue past it.
        let sql = format!(
            "SELECT ts, tag_index, value FROM \"{}\" WHERE ts > ?1 ORDER BY ts ASC, rowid ASC LIMIT ?2",
            self.table
        );
        let mut raw = sqlx::query_as::<_, RawReading>(&sql)
            .bind(since.timestamp())
            .bind((limit as i64) + 1)
            .fetch_all(self.client.pool())
            .await
            .map_err(source_err)?;

        if raw.len() > limit {
            let last_ts = raw[raw.len() - 1].0;
            if raw[0].0 == last_ts {
                // A single timestamp outgrew the chunk; deliver it whole
                raw = self.fetch_group(last_ts).await?;
            } else {
                // Drop the trailing group, the next fetch picks it up complete
                raw.retain(|(ts, _, _)| *ts != last_ts);
            }
        }

        Ok(decode_readings(raw))
    }
}

fn create_table_sql(table: &str, columns: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| format!("\"{c}\" REAL")).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (ts INTEGER NOT NULL PRIMARY KEY, {})",
        cols.join(", ")
    )
}

fn upsert_sql(table: &str, columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let placeholders: Vec<String> = (2..=columns.len() + 1).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = quoted
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO \"{table}\" (ts, {}) VALUES (?1, {}) ON CONFLICT(ts) DO UPDATE SET {}",
        quoted.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Wide destination table backed by SQLite, keyed on timestamp.
pub struct SqliteDestinationStore {
    client: SqliteClient,
    table: String,
    dict: TagDictionary,
}

impl SqliteDestinationStore {
    pub fn new(client: SqliteClient, table: &str, dict: TagDictionary) -> Self {
        Self {
            client,
            table: table.to_string(),
            dict,
        }
    }
}

#[async_trait]
impl DestinationStore for SqliteDestinationStore {
    async fn last_synced(&self) -> Result<Option<DateTime<Utc>>> {
        // Distinguish "no table yet" (a fresh destination) from a failing
        // query, which must propagate rather than restart history from zero.
        let exists = table_exists(self.client.pool(), &self.table)
            .await
            .map_err(dest_err)?;
        if !exists {
            return Ok(None);
        }

        let sql = format!("SELECT MAX(ts) FROM \"{}\"", self.table);
        let (max,) = sqlx::query_as::<_, (Option<i64>,)>(&sql)
            .fetch_one(self.client.pool())
            .await
            .map_err(dest_err)?;

        match max {
            Some(ts) => {
                let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                    SyncError::SchemaMismatch(format!(
                        "destination holds unrepresentable timestamp {ts}"
                    ))
                })?;
                Ok(Some(timestamp))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, rows: &[WideRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let width = self.dict.len();
        for row in rows {
            if row.values.len() != width {
                return Err(SyncError::SchemaMismatch(format!(
                    "wide row at {} carries {} values, expected {}",
                    row.timestamp,
                    row.values.len(),
                    width
                )));
            }
        }

        let sql = upsert_sql(&self.table, self.dict.columns());
        let mut tx = self.client.pool().begin().await.map_err(dest_err)?;
        for row in rows {
            let mut query = sqlx::query(&sql).bind(row.timestamp.timestamp());
            for value in &row.values {
                query = query.bind(*value);
            }
            query.execute(&mut *tx).await.map_err(dest_err)?;
        }
        tx.commit().await.map_err(dest_err)?;

        Ok(rows.len() as u64)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let sql = create_table_sql(&self.table, self.dict.columns());
        sqlx::query(&sql)
            .execute(self.client.pool())
            .await
            .map_err(dest_err)?;
        Ok(())
    }
}
