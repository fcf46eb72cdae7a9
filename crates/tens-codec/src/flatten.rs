//! Dot-path flattening of nested objects.
//!
//! Path segments escape `\` as `\\` and `.` as `\.`, so keys that already
//! contain dots survive a flatten/unflatten cycle.

use std::collections::BTreeMap;
use tens_canonical::CanonicalValue;

/// A row with nested objects collapsed into dot paths.
pub type FlatRow = BTreeMap<String, CanonicalValue>;

/// Flattens non-empty nested objects into dot paths. Empty objects and
/// arrays stay leaves.
pub fn flatten(row: &BTreeMap<String, CanonicalValue>) -> FlatRow {
    let mut flat = FlatRow::new();
    flatten_into(row, None, &mut flat);
    flat
}

fn flatten_into(
    object: &BTreeMap<String, CanonicalValue>,
    prefix: Option<&str>,
    out: &mut FlatRow,
) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, escape_segment(key)),
            None => escape_segment(key),
        };
        match value {
            CanonicalValue::Object(inner) if !inner.is_empty() => {
                flatten_into(inner, Some(&path), out)
            }
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuilds nested objects from dot paths.
///
/// A path whose parent slot already holds a non-object value is kept
/// verbatim as a top-level key.
pub fn unflatten(flat: FlatRow) -> BTreeMap<String, CanonicalValue> {
    let mut root = BTreeMap::new();
    for (path, value) in flat {
        let segments = split_path(&path);
        if !insert_path(&mut root, &segments, value.clone()) {
            root.insert(path, value);
        }
    }
    root
}

fn insert_path(
    object: &mut BTreeMap<String, CanonicalValue>,
    segments: &[String],
    value: CanonicalValue,
) -> bool {
    match segments {
        [] => false,
        [last] => {
            object.insert(last.clone(), value);
            true
        }
        [first, rest @ ..] => {
            let slot = object
                .entry(first.clone())
                .or_insert_with(|| CanonicalValue::Object(BTreeMap::new()));
            match slot {
                CanonicalValue::Object(inner) => insert_path(inner, rest, value),
                _ => false,
            }
        }
    }
}

fn escape_segment(key: &str) -> String {
    if !key.contains(['.', '\\']) {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 2);
    for ch in key.chars() {
        if ch == '.' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Splits a flattened path on unescaped dots, unescaping each segment.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    current.push('\\');
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    segments
}
