//! Tag dictionary: the static map from source tag index to destination column

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One configured tag mapping entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tag index as it appears in the narrow source rows
    pub index: u32,
    /// Destination column receiving this tag's values
    pub column: String,
}

/// Static tag dictionary, fixed for the process lifetime.
///
/// Column order is deterministic (ascending tag index) so wide rows, the
/// destination schema and the upsert statement always agree on positions.
/// Readings whose tag is absent here are silently dropped by the pivot.
#[derive(Debug, Clone)]
pub struct TagDictionary {
    slots: HashMap<u32, usize>,
    columns: Vec<String>,
}

impl TagDictionary {
    pub fn new(entries: &[TagEntry]) -> Self {
        let ordered: BTreeMap<u32, String> = entries
            .iter()
            .map(|e| (e.index, e.column.clone()))
            .collect();
        let slots = ordered
            .keys()
            .enumerate()
            .map(|(slot, index)| (*index, slot))
            .collect();
        let columns = ordered.into_values().collect();
        Self { slots, columns }
    }

    /// Column position for a tag index; `None` for tags outside the dictionary.
    pub fn slot_for(&self, tag_index: u32) -> Option<usize> {
        self.slots.get(&tag_index).copied()
    }

    /// All destination columns in dictionary order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, column: &str) -> TagEntry {
        TagEntry {
            index,
            column: column.to_string(),
        }
    }

    #[test]
    fn test_columns_ordered_by_index() {
        let dict = TagDictionary::new(&[
            entry(7, "flow_rate"),
            entry(1, "temp_supply"),
            entry(3, "temp_return"),
        ]);

        assert_eq!(dict.columns(), &["temp_supply", "temp_return", "flow_rate"]);
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_slot_lookup() {
        let dict = TagDictionary::new(&[entry(7, "flow_rate"), entry(1, "temp_supply")]);

        assert_eq!(dict.slot_for(1), Some(0));
        assert_eq!(dict.slot_for(7), Some(1));
        assert_eq!(dict.slot_for(99), None);
    }

    #[test]
    fn test_empty_dictionary() {
        let dict = TagDictionary::new(&[]);

        assert!(dict.is_empty());
        assert_eq!(dict.slot_for(0), None);
    }
}
