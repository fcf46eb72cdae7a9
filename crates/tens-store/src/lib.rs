//! Content-addressed on-disk store for encoded TENS datasets.
//!
//! This crate provides:
//! - [`ContentStore`], which persists each dataset once under its content hash
//! - An on-disk cache of materialized ids per `(hash, profile)`, invalidated
//!   when the tokenizer's fingerprint changes
//! - Temp-file-then-rename writes so readers never see a partial entry
//!
//! The directory layout is documented in [`layout`].

#![deny(missing_docs)]

/// Temp-file-then-rename writes.
pub mod atomic;
/// Error types for store operations.
pub mod error;
/// Directory layout.
pub mod layout;
/// Metadata records.
pub mod meta;
/// Content store.
pub mod store;
/// `tokens.bin` packing.
pub mod tokens;

pub use error::StoreError;
pub use layout::StoreLayout;
pub use meta::{CacheMeta, IrMeta, StoredSummary};
pub use store::{ContentStore, StoreOptions, StoreReceipt, StoreStats};
