//! # linekv - An Interactive In-Memory Key-Value Store
//!
//! linekv is a small Redis-like key-value server written in Rust. Clients
//! connect over TCP and type one command per line at a prompt; the server
//! answers in plain text.
//!
//! ## Features
//!
//! - **Typed values**: Keys hold either a byte string or a sorted set
//! - **Glob key search**: `KEYS` takes Redis-style glob patterns
//! - **TTL Support**: Keys can expire; one background task reclaims them
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │              StorageEngine                   │   │
//! │  │   Parser    │    │   RwLock<Keyspace>: values, expiry records,  │   │
//! │  │             │    │   timer queue                                │   │
//! │  └─────────────┘    └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::storage::{StorageEngine, start_expiry_sweeper};
//! use linekv::commands::CommandHandler;
//! use linekv::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let prompt: Arc<str> = Arc::from(linekv::DEFAULT_PROMPT);
//!
//!     let listener = TcpListener::bind("127.0.0.1:6380").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             handler,
//!             Arc::clone(&stats),
//!             Arc::clone(&prompt),
//!         ));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key` / `SET key value` / `DEL key`
//! - `KEYS pattern`
//! - `EXPIRE key seconds` / `TTL key`
//! - `TYPE key`
//! - `ZADD key score member [score member ...]`
//! - `ZRANGE key min max [BYRANK]`
//! - `PING [message]`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line framing, request tokenizing and response encoding
//! - [`storage`]: Thread-safe key space with TTL support
//! - [`commands`]: Validation and dispatch of requests
//! - [`connection`]: Client connection management
//!
//! ## Expiry
//!
//! A key past its deadline is invisible to every read, even before it is
//! removed. Removal is done by the [`ExpirySweeper`], which sleeps until the
//! earliest pending deadline. Each deadline carries a generation number, so
//! a stale timer never deletes a key that was re-expired or recreated.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, Request, Response};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine, StoreError};

/// The default port linekv listens on
pub const DEFAULT_PORT: u16 = 80;

/// The default host linekv binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Written to the client before each read
pub const DEFAULT_PROMPT: &str = "redis> ";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
