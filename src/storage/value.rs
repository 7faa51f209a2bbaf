//! Stored value variants.

use crate::storage::sorted_set::SortedSet;
use crate::storage::StoreError;
use bytes::Bytes;

/// A value held by a key. A key holds exactly one variant at a time.
#[derive(Debug, Clone)]
pub enum Value {
    /// An opaque byte string
    Bytes(Bytes),
    /// A score-ordered collection of members
    SortedSet(SortedSet),
}

impl Value {
    /// Returns the byte string, or `WrongType` for any other variant.
    pub fn as_bytes(&self) -> Result<&Bytes, StoreError> {
        match self {
            Value::Bytes(b) => Ok(b),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Returns the sorted set, or `WrongType` for any other variant.
    pub fn as_sorted_set(&self) -> Result<&SortedSet, StoreError> {
        match self {
            Value::SortedSet(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Mutable access to the sorted set, or `WrongType`.
    pub fn as_sorted_set_mut(&mut self) -> Result<&mut SortedSet, StoreError> {
        match self {
            Value::SortedSet(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Type name as reported to clients.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "string",
            Value::SortedSet(_) => "zset",
        }
    }
}
