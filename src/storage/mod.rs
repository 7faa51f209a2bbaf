//! Storage Engine Module
//!
//! This module provides the key space for linekv: typed values, per-key
//! expiration, the sorted-set index, and the background task that reclaims
//! expired keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │        RwLock<{ data, expires, timer queue }>               │
//! │                                                             │
//! │   Value::Bytes(Bytes)      Value::SortedSet(SortedSet)      │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ fire_due_timers()
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use linekv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set("session", Bytes::from("token123"));
//! assert!(engine.expire("session", Duration::from_secs(3600)));
//! assert!(engine.ttl("session") > 0);
//! ```

pub mod engine;
pub mod expiry;
pub mod sorted_set;
pub mod value;

use thiserror::Error;

// Re-export commonly used types
pub use engine::{ExpiryRecord, StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use sorted_set::{ScoredMember, SortedSet};
pub use value::Value;

/// Errors returned by storage operations.
///
/// A failed operation never leaves a partial change behind.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key holds a different kind of value than the operation needs
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The KEYS pattern is not a valid regular expression
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
