use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Integral floats below this magnitude fold into `i64`.
const INTEGER_FOLD_LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

/// Uncanonicalized input value.
///
/// Unlike `serde_json::Value` this can express everything the canonicalizer
/// has to resolve: absent values, non-finite floats and dates.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Absent value. Dropped from objects, `null` inside arrays.
    Undefined,
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number, possibly non-finite.
    Float(f64),
    /// Unnormalized string.
    String(String),
    /// Date as milliseconds since the Unix epoch; non-finite means invalid.
    Date(f64),
    /// Ordered sequence.
    Array(Vec<RawValue>),
    /// Object members in insertion order. Later duplicates win.
    Object(Vec<(String, RawValue)>),
}

impl RawValue {
    /// Builds a date value from a UTC timestamp.
    pub fn date(at: chrono::DateTime<chrono::Utc>) -> Self {
        RawValue::Date(at.timestamp_millis() as f64)
    }

    /// Builds an object from `(key, value)` pairs, keeping their order.
    pub fn object<K: Into<String>>(members: impl IntoIterator<Item = (K, RawValue)>) -> Self {
        RawValue::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => RawValue::String(s),
            Value::Array(items) => RawValue::Array(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => {
                RawValue::Object(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        RawValue::from(value.clone())
    }
}

/// A finite canonical number.
///
/// Integral floats that fit in `i64` are always represented as
/// [`Number::Int`], so `1` and `1.0` are the same canonical value.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Integer.
    Int(i64),
    /// Finite float with a fractional part or outside the `i64` range.
    Float(f64),
}

impl Number {
    /// Canonicalizes a float. Returns `None` for `NaN` and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < INTEGER_FOLD_LIMIT {
            // -0.0 lands here and becomes 0
            return Some(Number::Int(value as i64));
        }
        Some(Number::Float(value))
    }

    /// Returns the value as `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Parses literal text back into a number.
    ///
    /// Only text that is exactly the canonical rendering of a finite number is
    /// accepted, so `"007"`, `"1e3"` or `"NaN"` stay strings.
    pub fn parse_canonical(text: &str) -> Option<Self> {
        if let Ok(i) = text.parse::<i64>() {
            return (i.to_string() == text).then_some(Number::Int(i));
        }
        let f = text.parse::<f64>().ok()?;
        let number = Number::from_f64(f)?;
        (number.to_string() == text).then_some(number)
    }

    fn to_json(self) -> Value {
        match self {
            Number::Int(i) => Value::from(i),
            Number::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => {
                let magnitude = x.abs();
                if magnitude >= 1e21 || magnitude < 1e-6 {
                    write!(f, "{:e}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
        }
    }
}

/// Canonical value tree.
///
/// Object keys are held in a `BTreeMap`, which keeps them sorted by byte
/// order; strings are NFKC-normalized and numbers finite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Finite number.
    Number(Number),
    /// Normalized string.
    String(String),
    /// Ordered sequence.
    Array(Vec<CanonicalValue>),
    /// Sorted mapping.
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Returns the object map if this is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, CanonicalValue>> {
        match self {
            CanonicalValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, CanonicalValue::Null)
    }

    /// Converts into a `serde_json::Value`.
    pub fn to_json(&self) -> Value {
        match self {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Bool(b) => Value::Bool(*b),
            CanonicalValue::Number(n) => n.to_json(),
            CanonicalValue::String(s) => Value::String(s.clone()),
            CanonicalValue::Array(items) => {
                Value::Array(items.iter().map(CanonicalValue::to_json).collect())
            }
            CanonicalValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// RFC 8785 JSON text for this value.
    pub fn to_canonical_json(&self) -> String {
        // Canonical values never hold non-finite numbers, the only input
        // canonical_json rejects.
        canonical_json::to_string(&self.to_json()).unwrap_or_else(|_| "null".to_string())
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        CanonicalValue::String(value.to_string())
    }
}

impl From<i64> for CanonicalValue {
    fn from(value: i64) -> Self {
        CanonicalValue::Number(Number::Int(value))
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        CanonicalValue::Bool(value)
    }
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Canonicalization is idempotent, so re-running it over stored JSON
        // reproduces the original canonical value.
        let value = Value::deserialize(deserializer)?;
        Ok(crate::canonicalizer::canonicalize_value(&RawValue::from(value)))
    }
}
