use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hygiene status for a canonicalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HygieneStatus {
    /// The input was already canonical.
    Ok,
    /// Values were rewritten without losing information (key order, NFKC, `-0`).
    Normalized,
    /// Values were replaced by `null` or dropped; warnings should be inspected.
    Lossy,
}

/// Stable warning code emitted by canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HygieneWarning(String);

impl HygieneWarning {
    /// Creates a warning from a literal code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the warning code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

/// Hygiene report produced alongside canonical rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HygieneReport {
    /// Overall hygiene status.
    pub status: HygieneStatus,
    /// Warnings in the order they were first raised, each with the value path.
    pub warnings: Vec<HygieneWarning>,
    /// Occurrence count per warning code.
    pub metrics: BTreeMap<String, u64>,
    /// Canonicalization version that produced the rows.
    pub canonicalization_version: u32,
}

impl HygieneReport {
    pub(crate) fn new(canonicalization_version: u32) -> Self {
        Self {
            status: HygieneStatus::Ok,
            warnings: Vec::new(),
            metrics: BTreeMap::new(),
            canonicalization_version,
        }
    }

    pub(crate) fn record(&mut self, code: &'static str, path: &dyn std::fmt::Display, lossy: bool) {
        let count = self.metrics.entry(code.to_string()).or_insert(0);
        if *count == 0 {
            self.warnings
                .push(HygieneWarning::new(format!("{} at {}", code, path)));
        }
        *count += 1;

        let status = if lossy {
            HygieneStatus::Lossy
        } else {
            HygieneStatus::Normalized
        };
        if self.status != HygieneStatus::Lossy {
            self.status = status;
        }
    }

    /// Number of times `code` was raised.
    pub fn count(&self, code: &str) -> u64 {
        self.metrics.get(code).copied().unwrap_or(0)
    }
}
