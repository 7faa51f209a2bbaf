//! Line Protocol Implementation
//!
//! linekv speaks a plain-text, interactive protocol: one request per line,
//! one or more response lines back.
//!
//! ## Modules
//!
//! - `parser`: Line framing and request tokenizing
//! - `types`: The `Response` enum and its text encoding
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{split_line, Request, Response, MAX_LINE_SIZE};
//! use bytes::BytesMut;
//!
//! let mut buf = BytesMut::from(&b"GET name\n"[..]);
//! let line = split_line(&mut buf, MAX_LINE_SIZE).unwrap().unwrap();
//! let request = Request::parse(&line).unwrap();
//! assert_eq!(request.command, "GET");
//!
//! assert_eq!(Response::nil().serialize(), b"(nil)\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{split_line, ParseError, ParseResult, Request, MAX_LINE_SIZE};
pub use types::Response;
