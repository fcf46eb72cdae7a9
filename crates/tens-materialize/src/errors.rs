use tens_canonical::ValidationError;
use tens_codec::CodecError;
use thiserror::Error;

/// Errors that can occur during materialization.
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// The target profile is not configured.
    #[error("unknown target profile {profile}; known profiles: {}", known.join(", "))]
    UnknownProfile {
        /// Requested profile.
        profile: String,
        /// Configured profile ids.
        known: Vec<String>,
    },
    /// The profile's encoding has no registered tokenizer.
    #[error("profile {profile} uses encoding {encoding}, which has no tokenizer")]
    UnknownEncoding {
        /// Profile id.
        profile: String,
        /// Encoding name.
        encoding: String,
    },
    /// A profile id or encoding name is malformed.
    #[error("invalid profile configuration: {0}")]
    InvalidProfile(#[from] ValidationError),
    /// The dataset could not be laid out for formatting.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
