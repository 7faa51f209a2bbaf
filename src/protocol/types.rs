//! Response Types for the Line Protocol
//!
//! Every response is plain text terminated by `\n`.
//!
//! ## Encoding
//!
//! | Response        | Wire form                          |
//! |-----------------|------------------------------------|
//! | Status          | `OK\n`                             |
//! | Integer         | `42\n`                             |
//! | Bulk            | raw bytes + `\n`                   |
//! | Nil             | `(nil)\n`                          |
//! | List            | one element per line               |
//! | Scored          | `member  score` per line           |
//! | Error           | `ERR <message>\n`                  |

use bytes::Bytes;
use std::fmt;

/// Line terminator for every response line.
pub const NEWLINE: &[u8] = b"\n";

/// Text written for an absent value.
pub const NIL: &[u8] = b"(nil)";

/// Prefix written before every error message.
pub const ERROR_PREFIX: &[u8] = b"ERR ";

/// A typed response produced by the command layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Short status text such as `OK` or `PONG`
    Status(String),

    /// An error message, written as `ERR <message>`
    Error(String),

    /// A signed integer
    Integer(i64),

    /// A stored byte string, written verbatim
    Bulk(Bytes),

    /// An absent value
    Nil,

    /// A sequence of strings, one per line
    List(Vec<String>),

    /// A sequence of `(member, score)` pairs, one per line
    Scored(Vec<(Bytes, f64)>),
}

impl Response {
    pub fn status(s: impl Into<String>) -> Self {
        Response::Status(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Response::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Response::Bulk(data.into())
    }

    pub fn nil() -> Self {
        Response::Nil
    }

    /// Common response for successful writes
    pub fn ok() -> Self {
        Response::Status("OK".to_string())
    }

    pub fn pong() -> Self {
        Response::Status("PONG".to_string())
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Status(s) => {
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(NEWLINE);
            }
            Response::Error(s) => {
                buf.extend_from_slice(ERROR_PREFIX);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(NEWLINE);
            }
            Response::Integer(n) => {
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(NEWLINE);
            }
            Response::Bulk(data) => {
                buf.extend_from_slice(data);
                buf.extend_from_slice(NEWLINE);
            }
            Response::Nil => {
                buf.extend_from_slice(NIL);
                buf.extend_from_slice(NEWLINE);
            }
            Response::List(items) => {
                for item in items {
                    buf.extend_from_slice(item.as_bytes());
                    buf.extend_from_slice(NEWLINE);
                }
            }
            Response::Scored(entries) => {
                for (member, score) in entries {
                    buf.extend_from_slice(member);
                    buf.extend_from_slice(b"  ");
                    buf.extend_from_slice(score.to_string().as_bytes());
                    buf.extend_from_slice(NEWLINE);
                }
            }
        }
    }

    /// Returns true if this response is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Status(s) => write!(f, "{}", s),
            Response::Error(s) => write!(f, "(error) {}", s),
            Response::Integer(n) => write!(f, "(integer) {}", n),
            Response::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Response::Nil => write!(f, "(nil)"),
            Response::List(items) => write!(f, "(list of {})", items.len()),
            Response::Scored(entries) => write!(f, "(scored list of {})", entries.len()),
        }
    }
}
