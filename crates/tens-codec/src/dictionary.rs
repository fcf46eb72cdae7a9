//! Value dictionary for recurring strings.

use std::collections::HashMap;
use tens_canonical::CanonicalValue;

use crate::bands::MAX_DICT_ENTRIES;
use crate::flatten::FlatRow;

/// Strings promoted to dictionary entries, with ids in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<String>,
    index: HashMap<String, u32>,
}

impl Dictionary {
    /// Builds the dictionary for a batch.
    ///
    /// A string qualifies when it occurs at least twice as a value and has at
    /// least `min_chars` characters. Rows are scanned in order, fields in
    /// sorted order, array elements and inline-object values depth-first.
    pub fn build(rows: &[FlatRow], min_chars: usize) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in rows {
            for value in row.values() {
                count_strings(value, &mut order, &mut counts);
            }
        }

        let entries = order
            .into_iter()
            .filter(|s| counts.get(s).copied().unwrap_or(0) >= 2 && s.chars().count() >= min_chars)
            .take(MAX_DICT_ENTRIES)
            .map(str::to_string)
            .collect();
        Self::from_entries(entries)
    }

    /// Creates a dictionary from entries in id order.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(id, s)| (s.clone(), id as u32))
            .collect();
        Self { entries, index }
    }

    /// Id of `value`, if it is an entry.
    pub fn id_of(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Entry for `id`.
    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(String::as_str)
    }

    /// Entries in id order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn count_strings<'a>(
    value: &'a CanonicalValue,
    order: &mut Vec<&'a str>,
    counts: &mut HashMap<&'a str, usize>,
) {
    match value {
        CanonicalValue::String(s) => {
            let count = counts.entry(s.as_str()).or_insert(0);
            if *count == 0 {
                order.push(s.as_str());
            }
            *count += 1;
        }
        CanonicalValue::Array(items) => {
            for item in items {
                count_strings(item, order, counts);
            }
        }
        CanonicalValue::Object(map) => {
            for item in map.values() {
                count_strings(item, order, counts);
            }
        }
        _ => {}
    }
}
