//! Command Handler Module
//!
//! This module implements the command processing layer for linekv.
//! It receives tokenized requests, validates them, executes them against the
//! storage engine, and returns typed responses.
//!
//! ## Architecture
//!
//! ```text
//! Client Line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lookup       │
//! │  - Arity check  │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `GET`, `SET`
//!
//! ### Key Commands
//! - `DEL`, `KEYS`, `EXPIRE`, `TTL`, `TYPE`
//!
//! ### Sorted Set Commands
//! - `ZADD`, `ZRANGE`
//!
//! ### Server Commands
//! - `PING`

pub mod glob;
pub mod handler;
pub mod kind;

// Re-export the main command handler
pub use glob::glob_to_regex;
pub use handler::{CommandError, CommandHandler};
pub use kind::CommandKind;
