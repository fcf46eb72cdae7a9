use thiserror::Error;

/// Rejected identifiers: content hashes, profile ids, encoding names.
///
/// All of these end up as path components in the store, so anything outside
/// the expected pattern is refused before it reaches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The value does not match the identifier pattern.
    #[error("invalid {field} '{value}': expected {pattern}")]
    PatternMismatch {
        /// Kind of identifier.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Pattern the value must match.
        pattern: &'static str,
    },
}
