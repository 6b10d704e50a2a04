//! Narrow-to-wide pivot transform
//!
//! Turns a batch of tag readings into one wide row per distinct timestamp.
//! The transform is pure: it touches no store and carries no state between
//! batches, which keeps it trivially testable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::tags::TagDictionary;
use crate::types::{truncate_to_second, Reading, WideRow};

/// Result of one pivot pass.
#[derive(Debug)]
pub struct PivotOutcome {
    /// Wide rows in ascending timestamp order
    pub rows: Vec<WideRow>,
    /// Readings dropped because their tag is not in the dictionary
    pub unknown_dropped: u64,
    /// Readings dropped as later duplicates of a (timestamp, column) pair
    pub duplicates_dropped: u64,
}

struct RowAccum {
    values: Vec<Option<f64>>,
    /// Slot occupancy, tracked separately so a null value still claims its
    /// slot and later duplicates cannot overwrite it
    seen: Vec<bool>,
}

impl RowAccum {
    fn new(width: usize) -> Self {
        Self {
            values: vec![None; width],
            seen: vec![false; width],
        }
    }
}

/// Pivot a batch of readings against the tag dictionary.
///
/// Unknown tags are dropped without error. When several readings map to the
/// same (timestamp, column) pair, the first in input order wins; the batch
/// order therefore decides precedence. Every produced row carries a value
/// slot for every dictionary column, `None` where no reading arrived.
///
/// Timestamps are truncated to whole seconds, the same normalization the
/// source stores apply on fetch; two same-tag samples inside one second
/// count as duplicates.
pub fn pivot(readings: &[Reading], dict: &TagDictionary) -> PivotOutcome {
    let width = dict.len();
    let mut groups: BTreeMap<DateTime<Utc>, RowAccum> = BTreeMap::new();
    let mut unknown_dropped = 0u64;
    let mut duplicates_dropped = 0u64;

    for reading in readings {
        let Some(slot) = dict.slot_for(reading.tag_index) else {
            unknown_dropped += 1;
            continue;
        };

        let ts = truncate_to_second(reading.timestamp);
        let row = groups.entry(ts).or_insert_with(|| RowAccum::new(width));
        if row.seen[slot] {
            duplicates_dropped += 1;
            continue;
        }
        row.seen[slot] = true;
        row.values[slot] = reading.value;
    }

    let rows = groups
        .into_iter()
        .map(|(timestamp, accum)| WideRow {
            timestamp,
            values: accum.values,
        })
        .collect();

    PivotOutcome {
        rows,
        unknown_dropped,
        duplicates_dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagEntry;
    use chrono::TimeZone;

    fn dict(entries: &[(u32, &str)]) -> TagDictionary {
        let entries: Vec<TagEntry> = entries
            .iter()
            .map(|(index, column)| TagEntry {
                index: *index,
                column: (*column).to_string(),
            })
            .collect();
        TagDictionary::new(&entries)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn reading(t: DateTime<Utc>, tag_index: u32, value: f64) -> Reading {
        Reading {
            timestamp: t,
            tag_index,
            value: Some(value),
        }
    }

    #[test]
    fn test_known_and_unknown_tags() {
        let dict = dict(&[(1, "a"), (2, "b")]);
        let t1 = ts(1_700_000_000);
        let readings = vec![
            reading(t1, 1, 10.0),
            reading(t1, 2, 20.0),
            reading(t1, 3, 99.0),
        ];

        let outcome = pivot(&readings, &dict);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].timestamp, t1);
        assert_eq!(outcome.rows[0].values, vec![Some(10.0), Some(20.0)]);
        assert_eq!(outcome.unknown_dropped, 1);
        assert_eq!(outcome.duplicates_dropped, 0);
    }

    #[test]
    fn test_uniform_column_set() {
        let dict = dict(&[(1, "a"), (2, "b")]);
        let readings = vec![
            reading(ts(100), 1, 1.5),
            // tag 2 never reports at ts 100, tag 1 never at ts 200
            reading(ts(200), 2, 2.5),
        ];

        let outcome = pivot(&readings, &dict);

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].values, vec![Some(1.5), None]);
        assert_eq!(outcome.rows[1].values, vec![None, Some(2.5)]);
    }

    #[test]
    fn test_first_seen_wins_on_duplicates() {
        let dict = dict(&[(1, "a")]);
        let t1 = ts(100);
        let readings = vec![reading(t1, 1, 10.0), reading(t1, 1, 77.0)];

        let outcome = pivot(&readings, &dict);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].values, vec![Some(10.0)]);
        assert_eq!(outcome.duplicates_dropped, 1);
    }

    #[test]
    fn test_null_first_occurrence_claims_slot() {
        let dict = dict(&[(1, "a")]);
        let t1 = ts(100);
        let readings = vec![
            Reading {
                timestamp: t1,
                tag_index: 1,
                value: None,
            },
            reading(t1, 1, 5.0),
        ];

        let outcome = pivot(&readings, &dict);

        assert_eq!(outcome.rows[0].values, vec![None]);
        assert_eq!(outcome.duplicates_dropped, 1);
    }

    #[test]
    fn test_sub_second_readings_share_a_bucket() {
        let dict = dict(&[(1, "a"), (2, "b")]);
        let base = ts(100);
        let readings = vec![
            reading(base + chrono::Duration::milliseconds(300), 1, 1.0),
            reading(base + chrono::Duration::milliseconds(700), 2, 2.0),
            // same second, same tag: duplicate
            reading(base + chrono::Duration::milliseconds(900), 1, 9.0),
        ];

        let outcome = pivot(&readings, &dict);

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].timestamp, base);
        assert_eq!(outcome.rows[0].values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(outcome.duplicates_dropped, 1);
    }

    #[test]
    fn test_rows_sorted_ascending() {
        let dict = dict(&[(1, "a")]);
        let readings = vec![
            reading(ts(300), 1, 3.0),
            reading(ts(100), 1, 1.0),
            reading(ts(200), 1, 2.0),
        ];

        let outcome = pivot(&readings, &dict);

        let stamps: Vec<_> = outcome.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![ts(100), ts(200), ts(300)]);
    }

    #[test]
    fn test_all_unknown_yields_no_rows() {
        let dict = dict(&[(1, "a")]);
        let readings = vec![reading(ts(100), 8, 1.0), reading(ts(200), 9, 2.0)];

        let outcome = pivot(&readings, &dict);

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.unknown_dropped, 2);
    }

    #[test]
    fn test_empty_batch() {
        let dict = dict(&[(1, "a")]);

        let outcome = pivot(&[], &dict);

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.unknown_dropped, 0);
        assert_eq!(outcome.duplicates_dropped, 0);
    }
}
