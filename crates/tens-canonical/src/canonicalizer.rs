use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::hygiene::HygieneReport;
use crate::value::{CanonicalValue, Number, RawValue};

/// Version tag of the canonical form. Bumped whenever canonical output changes.
pub const CANONICALIZATION_VERSION: u32 = 1;

/// Dates outside this range (milliseconds from the epoch) are invalid.
const MAX_DATE_MILLIS: f64 = 8.64e15;

/// Result of canonicalization.
#[derive(Debug, Clone)]
pub struct CanonicalizationResult {
    /// Canonical rows, in input order.
    pub rows: Vec<CanonicalValue>,
    /// Hygiene report describing what was rewritten.
    pub report: HygieneReport,
}

/// Helper for building value paths in hygiene warnings.
#[derive(Debug, Clone)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn row(index: usize) -> Self {
        Self {
            segments: vec![format!("[{}]", index)],
        }
    }

    fn push_field(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        Self { segments }
    }

    fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(format!("[{}]", index));
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Canonicalizer that turns raw rows into deterministic value trees.
///
/// Canonicalization never fails: values that have no canonical form resolve
/// to `null` (or a dropped key) and are recorded in the [`HygieneReport`].
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    _private: (),
}

impl Canonicalizer {
    /// Creates a canonicalizer for [`CANONICALIZATION_VERSION`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizes rows and reports every rewrite.
    pub fn canonicalize(&self, rows: &[RawValue]) -> CanonicalizationResult {
        let mut report = HygieneReport::new(CANONICALIZATION_VERSION);
        let rows = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let path = Path::row(idx);
                self.walk(row, &path, &mut report).unwrap_or_else(|| {
                    report.record("UndefinedDropped", &path, false);
                    CanonicalValue::Null
                })
            })
            .collect();
        CanonicalizationResult { rows, report }
    }

    /// Canonicalizes rows parsed from JSON.
    pub fn canonicalize_json(&self, rows: &[Value]) -> CanonicalizationResult {
        let raw: Vec<RawValue> = rows.iter().map(RawValue::from).collect();
        self.canonicalize(&raw)
    }

    /// Returns `None` for values that must disappear from their parent object.
    fn walk(&self, value: &RawValue, path: &Path, report: &mut HygieneReport) -> Option<CanonicalValue> {
        let canonical = match value {
            RawValue::Undefined => return None,
            RawValue::Null => CanonicalValue::Null,
            RawValue::Bool(b) => CanonicalValue::Bool(*b),
            RawValue::Int(i) => CanonicalValue::Number(Number::Int(*i)),
            RawValue::Float(f) => match Number::from_f64(*f) {
                Some(number) => {
                    if *f == 0.0 && f.is_sign_negative() {
                        report.record("NegativeZero", path, false);
                    }
                    CanonicalValue::Number(number)
                }
                None => {
                    report.record("NonFiniteNumber", path, true);
                    CanonicalValue::Null
                }
            },
            RawValue::String(s) => {
                let normalized = normalize_string(s);
                if normalized != *s {
                    report.record("StringNormalized", path, false);
                }
                CanonicalValue::String(normalized)
            }
            RawValue::Date(millis) => match format_date(*millis) {
                Some(iso) => CanonicalValue::String(iso),
                None => {
                    report.record("InvalidDate", path, true);
                    CanonicalValue::Null
                }
            },
            RawValue::Array(items) => CanonicalValue::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        let item_path = path.push_index(idx);
                        self.walk(item, &item_path, report).unwrap_or_else(|| {
                            report.record("UndefinedDropped", &item_path, false);
                            CanonicalValue::Null
                        })
                    })
                    .collect(),
            ),
            RawValue::Object(members) => {
                let mut map = BTreeMap::new();
                for (key, child) in members {
                    let key: String = key.nfkc().collect();
                    let child_path = path.push_field(&key);
                    match self.walk(child, &child_path, report) {
                        Some(v) => {
                            map.insert(key, v);
                        }
                        None => {
                            // A later `undefined` erases an earlier value for the same key.
                            map.remove(&key);
                            report.record("UndefinedDropped", &child_path, false);
                        }
                    }
                }
                CanonicalValue::Object(map)
            }
        };
        Some(canonical)
    }
}

/// Canonicalizes rows without a report.
pub fn canonicalize(rows: &[RawValue]) -> Vec<CanonicalValue> {
    Canonicalizer::new().canonicalize(rows).rows
}

/// Canonicalizes a single value. Top-level `Undefined` becomes `null`.
pub fn canonicalize_value(value: &RawValue) -> CanonicalValue {
    let mut report = HygieneReport::new(CANONICALIZATION_VERSION);
    Canonicalizer::new()
        .walk(value, &Path::row(0), &mut report)
        .unwrap_or(CanonicalValue::Null)
}

/// NFKC-normalizes `s` and strips trailing whitespace from every line.
pub fn normalize_string(s: &str) -> String {
    let normalized: String = s.nfkc().collect();
    normalized
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// ISO-8601 UTC with millisecond precision, or `None` for invalid dates.
fn format_date(millis: f64) -> Option<String> {
    if !millis.is_finite() || millis.abs() > MAX_DATE_MILLIS {
        return None;
    }
    let at = chrono::DateTime::from_timestamp_millis(millis.trunc() as i64)?;
    Some(at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hygiene::HygieneStatus;

    fn obj(members: Vec<(&str, RawValue)>) -> RawValue {
        RawValue::object(members)
    }

    #[test]
    fn sorts_keys_recursively() {
        let row = obj(vec![
            ("z", obj(vec![("b", RawValue::Int(1)), ("a", RawValue::Int(2))])),
            ("m", RawValue::Int(3)),
        ]);
        let canonical = canonicalize_value(&row);
        let outer: Vec<&String> = canonical.as_object().unwrap().keys().collect();
        assert_eq!(outer, vec!["m", "z"]);
        let inner: Vec<&String> = canonical.as_object().unwrap()["z"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(inner, vec!["a", "b"]);
    }

    #[test]
    fn undefined_members_are_dropped_not_nulled() {
        let with_undefined = obj(vec![("a", RawValue::Int(1)), ("b", RawValue::Undefined)]);
        let without = obj(vec![("a", RawValue::Int(1))]);
        assert_eq!(canonicalize_value(&with_undefined), canonicalize_value(&without));
    }

    #[test]
    fn undefined_array_elements_become_null() {
        let value = RawValue::Array(vec![RawValue::Undefined, RawValue::Int(1)]);
        assert_eq!(
            canonicalize_value(&value),
            CanonicalValue::Array(vec![CanonicalValue::Null, CanonicalValue::from(1)])
        );
    }

    #[test]
    fn non_finite_numbers_become_null_and_are_reported() {
        let rows = vec![obj(vec![
            ("nan", RawValue::Float(f64::NAN)),
            ("inf", RawValue::Float(f64::INFINITY)),
            ("neg", RawValue::Float(f64::NEG_INFINITY)),
        ])];
        let result = Canonicalizer::new().canonicalize(&rows);
        let map = result.rows[0].as_object().unwrap();
        assert!(map.values().all(CanonicalValue::is_null));
        assert_eq!(result.report.status, HygieneStatus::Lossy);
        assert_eq!(result.report.count("NonFiniteNumber"), 3);
    }

    #[test]
    fn negative_zero_becomes_zero() {
        let result = Canonicalizer::new().canonicalize(&[RawValue::Float(-0.0)]);
        assert_eq!(result.rows[0], CanonicalValue::from(0));
        assert_eq!(result.report.status, HygieneStatus::Normalized);
    }

    #[test]
    fn strings_are_nfkc_normalized_and_right_trimmed_per_line() {
        assert_eq!(normalize_string("ﬁne  \n  indented\t\nlast "), "fine\n  indented\nlast");
        assert_eq!(normalize_string("trailing newline \n"), "trailing newline\n");
        assert_eq!(normalize_string("Ａ１"), "A1");
    }

    #[test]
    fn dates_render_as_iso_millis() {
        let value = RawValue::Date(1_700_000_000_123.0);
        assert_eq!(
            canonicalize_value(&value),
            CanonicalValue::from("2023-11-14T22:13:20.123Z")
        );
    }

    #[test]
    fn invalid_dates_become_null() {
        let result = Canonicalizer::new()
            .canonicalize(&[RawValue::Date(f64::NAN), RawValue::Date(9.0e15)]);
        assert_eq!(result.rows, vec![CanonicalValue::Null, CanonicalValue::Null]);
        assert_eq!(result.report.count("InvalidDate"), 2);
    }

    #[test]
    fn already_canonical_input_reports_ok() {
        let row = obj(vec![("a", RawValue::Int(1)), ("b", RawValue::String("x".into()))]);
        let result = Canonicalizer::new().canonicalize(&[row]);
        assert_eq!(result.report.status, HygieneStatus::Ok);
        assert!(result.report.warnings.is_empty());
    }
}
