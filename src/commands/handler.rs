//! Command Handler Module
//!
//! This module validates parsed requests and dispatches them to the storage
//! engine. Each request maps to exactly one storage call.
//!
//! ## Supported Commands
//!
//! - `GET key` - Get a key's value
//! - `SET key value` - Set a key, replacing any value and expiry
//! - `DEL key` - Delete a key
//! - `KEYS pattern` - Find keys by glob pattern
//! - `EXPIRE key seconds` - Set expiry
//! - `TTL key` - Get remaining TTL
//! - `TYPE key` - Get key type ("string", "zset", or "none")
//! - `ZADD key score member [score member ...]` - Add entries to a sorted set
//! - `ZRANGE key min max [BYRANK]` - Entries by score, or by rank with `BYRANK`
//! - `PING [message]` - Test connection
//!
//! ## Validation
//!
//! Before the store is touched, the handler checks:
//!
//! 1. The command name is known (`InvalidCommand`)
//! 2. Enough arguments were given (`MinReqParams`)
//! 3. Numeric arguments parse (`InvalidIntValue` / `InvalidFloatValue`)
//!
//! Storage errors are passed through unchanged.

use crate::commands::glob::glob_to_regex;
use crate::commands::kind::CommandKind;
use crate::protocol::{Request, Response};
use crate::storage::{StorageEngine, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while validating or executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Unrecognized command name
    #[error("unknown command '{0}'")]
    InvalidCommand(String),

    /// Fewer arguments than the command requires
    #[error("wrong number of arguments for '{0}' command")]
    MinReqParams(&'static str),

    /// A score or score bound is not a float
    #[error("value is not a valid float")]
    InvalidFloatValue,

    /// A count, TTL or rank is not an integer
    #[error("value is not an integer or out of range")]
    InvalidIntValue,

    /// Unexpected option or incomplete argument group
    #[error("syntax error")]
    SyntaxError,

    /// Error reported by the storage engine
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handles commands by dispatching them to the storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a request and returns the response.
    ///
    /// Errors are turned into `Response::Error`; this never fails.
    pub fn execute(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                debug!(command = %request.command, error = %e, "Command failed");
                Response::error(e.to_string())
            }
        }
    }

    /// Validates a request and runs it against the storage engine.
    pub fn dispatch(&self, request: &Request) -> Result<Response, CommandError> {
        let kind = CommandKind::from_name(&request.command)
            .ok_or_else(|| CommandError::InvalidCommand(request.command.clone()))?;

        let args = request.args.as_slice();
        if args.len() < kind.min_args() {
            return Err(CommandError::MinReqParams(kind.name()));
        }

        debug!(command = kind.name(), args = args.len(), "Dispatching command");

        match kind {
            CommandKind::Get => self.cmd_get(args),
            CommandKind::Set => self.cmd_set(args),
            CommandKind::Del => self.cmd_del(args),
            CommandKind::Keys => self.cmd_keys(args),
            CommandKind::Expire => self.cmd_expire(args),
            CommandKind::Ttl => self.cmd_ttl(args),
            CommandKind::Type => self.cmd_type(args),
            CommandKind::ZAdd => self.cmd_zadd(args),
            CommandKind::ZRange => self.cmd_zrange(args),
            CommandKind::Ping => self.cmd_ping(args),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn parse_int(value: &str) -> Result<i64, CommandError> {
        value.parse().map_err(|_| CommandError::InvalidIntValue)
    }

    /// Parses a score. `inf`, `+inf` and `-inf` are accepted, NaN is not.
    fn parse_float(value: &str) -> Result<f64, CommandError> {
        match value.parse::<f64>() {
            Ok(f) if !f.is_nan() => Ok(f),
            _ => Err(CommandError::InvalidFloatValue),
        }
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// GET key
    fn cmd_get(&self, args: &[String]) -> Result<Response, CommandError> {
        Ok(match self.storage.get(&args[0])? {
            Some(value) => Response::bulk(value),
            None => Response::nil(),
        })
    }

    /// SET key value
    fn cmd_set(&self, args: &[String]) -> Result<Response, CommandError> {
        self.storage.set(args[0].as_str(), Bytes::from(args[1].clone()));
        Ok(Response::ok())
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// DEL key
    fn cmd_del(&self, args: &[String]) -> Result<Response, CommandError> {
        let deleted = self.storage.delete(&args[0]);
        Ok(Response::integer(deleted as i64))
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[String]) -> Result<Response, CommandError> {
        let regex = glob_to_regex(&args[0]);
        let keys = self.storage.keys(&regex)?;
        Ok(Response::List(keys))
    }

    /// EXPIRE key seconds
    ///
    /// A non-positive TTL makes the key disappear right away.
    fn cmd_expire(&self, args: &[String]) -> Result<Response, CommandError> {
        let seconds = Self::parse_int(&args[1])?;
        let ttl = Duration::from_secs(seconds.max(0) as u64);

        let set = self.storage.expire(&args[0], ttl);
        Ok(Response::integer(i64::from(set)))
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> Result<Response, CommandError> {
        Ok(Response::integer(self.storage.ttl(&args[0])))
    }

    /// TYPE key
    fn cmd_type(&self, args: &[String]) -> Result<Response, CommandError> {
        let type_name = self.storage.key_type(&args[0]).unwrap_or("none");
        Ok(Response::status(type_name))
    }

    // ========================================================================
    // Sorted Set Commands
    // ========================================================================

    /// ZADD key score member [score member ...]
    fn cmd_zadd(&self, args: &[String]) -> Result<Response, CommandError> {
        let pairs = &args[1..];
        if pairs.len() % 2 != 0 {
            return Err(CommandError::SyntaxError);
        }

        let entries = pairs
            .chunks_exact(2)
            .map(|pair| Ok((Self::parse_float(&pair[0])?, Bytes::from(pair[1].clone()))))
            .collect::<Result<Vec<_>, CommandError>>()?;

        let added = self.storage.zadd(&args[0], &entries)?;
        Ok(Response::integer(added as i64))
    }

    /// ZRANGE key min max [BYRANK]
    fn cmd_zrange(&self, args: &[String]) -> Result<Response, CommandError> {
        let by_rank = match &args[3..] {
            [] => false,
            [option] if option == "BYRANK" => true,
            _ => return Err(CommandError::SyntaxError),
        };

        let entries = if by_rank {
            let start = Self::parse_int(&args[1])?;
            let stop = Self::parse_int(&args[2])?;
            self.storage.zrange_by_rank(&args[0], start, stop)?
        } else {
            let min = Self::parse_float(&args[1])?;
            let max = Self::parse_float(&args[2])?;
            self.storage.zrange_by_score(&args[0], min, max)?
        };

        Ok(Response::Scored(
            entries
                .into_iter()
                .map(|entry| (entry.member, entry.score))
                .collect(),
        ))
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[String]) -> Result<Response, CommandError> {
        Ok(match args.first() {
            Some(message) => Response::bulk(Bytes::from(message.clone())),
            None => Response::pong(),
        })
    }
}
