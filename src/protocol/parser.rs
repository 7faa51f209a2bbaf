//! Line Protocol Parser
//!
//! Requests are single lines of text. The first token is the command name and
//! the remaining tokens are positional arguments. Tokens are separated by ASCII
//! whitespace; there is no quoting, so an argument can never contain a space.
//!
//! Parsing happens in two steps:
//!
//! 1. [`split_line`] cuts one complete line off the front of the read buffer.
//!    It returns `Ok(None)` while the line is still incomplete, and fails only
//!    when the buffered data grows past the maximum line size.
//! 2. [`Request::parse`] tokenizes that line. Its errors are per-request: the
//!    caller reports them and keeps reading.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while parsing input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line contained no tokens
    #[error("empty request")]
    EmptyRequest,

    /// The line is not valid UTF-8
    #[error("invalid UTF-8 in request")]
    InvalidUtf8,

    /// No newline within the allowed line size
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a single request line (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// A tokenized request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command name, exactly as sent
    pub command: String,
    /// Positional arguments
    pub args: Vec<String>,
}

impl Request {
    /// Creates a request from a command name and its arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Tokenizes a single line (without its terminator).
    ///
    /// # Example
    ///
    /// ```
    /// use linekv::protocol::Request;
    ///
    /// let request = Request::parse(b"SET name linekv").unwrap();
    /// assert_eq!(request.command, "SET");
    /// assert_eq!(request.args, vec!["name", "linekv"]);
    /// ```
    pub fn parse(line: &[u8]) -> ParseResult<Self> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
        let mut tokens = line.split_ascii_whitespace();

        let command = tokens.next().ok_or(ParseError::EmptyRequest)?;
        let args = tokens.map(str::to_string).collect();

        Ok(Self::new(command, args))
    }
}

/// Removes one complete line from the front of `buf`.
///
/// The returned line excludes the `\n` terminator and an optional `\r`
/// before it.
///
/// # Returns
///
/// - `Ok(Some(line))` - A complete line was consumed from the buffer
/// - `Ok(None)` - No newline yet, need more bytes
/// - `Err(LineTooLong)` - More than `max_line` bytes buffered without a newline
pub fn split_line(buf: &mut BytesMut, max_line: usize) -> ParseResult<Option<Bytes>> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => {
            let mut line = buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            Ok(Some(line.freeze()))
        }
        None if buf.len() > max_line => Err(ParseError::LineTooLong {
            size: buf.len(),
            max: max_line,
        }),
        None => Ok(None),
    }
}
