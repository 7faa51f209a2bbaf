//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the key space for linekv: a map from keys to typed
//! values, the expiration records attached to some of those keys, and the queue
//! of pending expiry timers.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                 RwLock<Keyspace>                      │  │
//! │  │  data:    HashMap<String, Value>                      │  │
//! │  │  expires: HashMap<String, ExpiryRecord>               │  │
//! │  │  timers:  BinaryHeap<(deadline, generation, key)>     │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single lock guards everything. Reads (`get`, `keys`, `ttl`, `zrange_*`)
//! share it; writes (`set`, `delete`, `expire`, `zadd`) and timer firing hold
//! it exclusively. With only one lock there is no lock ordering to get wrong.
//!
//! ## Expiry
//!
//! Every `expire` call stamps the key's record with a fresh generation and
//! pushes a timer carrying that generation. When the timer fires it only
//! deletes the key if the record still carries the same generation, so
//! re-expiring, deleting or overwriting a key turns older timers into no-ops.
//!
//! Reads treat a key whose deadline has passed as absent even before its timer
//! fires. Writes purge such a key before acting on it.

use crate::storage::sorted_set::{ScoredMember, SortedSet};
use crate::storage::value::Value;
use crate::storage::StoreError;
use bytes::Bytes;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Longest TTL accepted; larger requests are clamped to this.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Stale timers tolerated beyond twice the live record count.
const TIMER_COMPACT_SLACK: usize = 64;

/// The countdown attached to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryRecord {
    /// When the key stops being visible
    pub deadline: Instant,
    /// Identifies the timer that owns this record
    pub generation: u64,
}

/// A pending expiry timer. Ordered by deadline first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
    deadline: Instant,
    generation: u64,
    key: String,
}

#[derive(Debug, Default)]
struct Keyspace {
    data: HashMap<String, Value>,
    expires: HashMap<String, ExpiryRecord>,
    timers: BinaryHeap<Reverse<Timer>>,
    next_generation: u64,
}

impl Keyspace {
    #[inline]
    fn is_expired(&self, key: &str, now: Instant) -> bool {
        self.expires
            .get(key)
            .is_some_and(|record| record.deadline <= now)
    }

    /// Looks up a key, hiding it if its deadline has passed.
    fn live(&self, key: &str, now: Instant) -> Option<&Value> {
        if self.is_expired(key, now) {
            return None;
        }
        self.data.get(key)
    }

    /// Removes a key together with its expiration record.
    fn remove(&mut self, key: &str) -> bool {
        self.expires.remove(key);
        self.data.remove(key).is_some()
    }

    /// Drops superseded timers once they outnumber live records.
    ///
    /// A timer is live while its key's record still carries its generation.
    fn compact_timers(&mut self) {
        if self.timers.len() <= 2 * self.expires.len() + TIMER_COMPACT_SLACK {
            return;
        }
        let expires = &self.expires;
        self.timers.retain(|Reverse(timer)| {
            expires
                .get(&timer.key)
                .is_some_and(|record| record.generation == timer.generation)
        });
    }
}

/// Statistics about the storage engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Keys currently held, including expired ones not yet reclaimed
    pub keys: u64,
    /// Keys with an active expiration record
    pub volatile_keys: u64,
    /// Timers still queued, including superseded ones
    pub pending_timers: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    /// Keys removed because their TTL elapsed
    pub expired: u64,
}

/// The key space shared by every connection.
///
/// Wrap it in an `Arc` and hand a clone to each connection task and to the
/// expiry sweeper.
///
/// # Example
///
/// ```
/// use linekv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", Bytes::from("linekv"));
/// assert_eq!(engine.get("name").unwrap(), Some(Bytes::from("linekv")));
///
/// engine.zadd("board", &[(5.0, Bytes::from("x")), (1.0, Bytes::from("y"))]).unwrap();
/// let entries = engine.zrange_by_score("board", 0.0, 10.0).unwrap();
/// assert_eq!(entries[0].member, Bytes::from("y"));
/// ```
pub struct StorageEngine {
    keyspace: RwLock<Keyspace>,

    /// Wakes the expiry sweeper when a timer is queued
    timer_added: Notify,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            timer_added: Notify::new(),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    // Lock poisoning is ignored; every write leaves the maps consistent.
    fn read(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.keyspace.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.keyspace.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes `key` if its deadline has passed. Returns `true` if it did.
    fn purge_if_expired(&self, keyspace: &mut Keyspace, key: &str, now: Instant) -> bool {
        if keyspace.is_expired(key, now) {
            keyspace.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Stores a byte string under `key`.
    ///
    /// Any previous value is replaced regardless of its type, and any
    /// expiration record on the key is discarded.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was replaced.
    pub fn set(&self, key: impl Into<String>, value: Bytes) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let key = key.into();

        let mut keyspace = self.write();
        self.purge_if_expired(&mut keyspace, &key, Instant::now());
        keyspace.expires.remove(&key);
        keyspace.data.insert(key, Value::Bytes(value)).is_none()
    }

    /// Gets the byte string stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist or has expired, and
    /// `WrongType` if it holds a sorted set.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let keyspace = self.read();
        match keyspace.live(key, Instant::now()) {
            Some(value) => value.as_bytes().map(|b| Some(b.clone())),
            None => Ok(None),
        }
    }

    /// Deletes a key, its value and its expiration record.
    ///
    /// # Returns
    ///
    /// Returns 1 if the key was removed, 0 if it did not exist.
    pub fn delete(&self, key: &str) -> u64 {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.write();
        if self.purge_if_expired(&mut keyspace, key, Instant::now()) {
            return 0;
        }
        u64::from(keyspace.remove(key))
    }

    /// Returns every live key whose name matches `pattern`.
    ///
    /// `pattern` is a regular expression, not a glob; it is searched for
    /// anywhere in the key, so anchor it with `^...$` for a full match. Order
    /// of the result is unspecified.
    ///
    /// **Warning**: This operation scans all keys and can be slow on large databases.
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let regex = Regex::new(pattern)?;
        let now = Instant::now();

        let keyspace = self.read();
        Ok(keyspace
            .data
            .keys()
            .filter(|key| !keyspace.is_expired(key, now) && regex.is_match(key))
            .cloned()
            .collect())
    }

    /// Starts a countdown on an existing key.
    ///
    /// The key disappears once `ttl` has elapsed. Calling this again on the
    /// same key replaces the countdown; the earlier timer no longer has any
    /// effect.
    ///
    /// # Returns
    ///
    /// Returns `true` if the expiry was set, `false` if the key doesn't exist.
    pub fn expire(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        {
            let mut keyspace = self.write();
            if self.purge_if_expired(&mut keyspace, key, now) || !keyspace.data.contains_key(key) {
                return false;
            }

            let generation = keyspace.next_generation;
            keyspace.next_generation += 1;
            let deadline = now + ttl.min(MAX_TTL);

            keyspace
                .expires
                .insert(key.to_string(), ExpiryRecord { deadline, generation });
            keyspace.timers.push(Reverse(Timer {
                deadline,
                generation,
                key: key.to_string(),
            }));
            keyspace.compact_timers();
        }

        self.timer_added.notify_one();
        true
    }

    /// Gets the remaining TTL for a key in whole seconds, rounded up.
    ///
    /// Returns -1 if the key has no expiration record or its deadline has
    /// already passed, whether or not the key has been reclaimed yet.
    pub fn ttl(&self, key: &str) -> i64 {
        let now = Instant::now();
        let keyspace = self.read();

        match keyspace.expires.get(key) {
            Some(record) if record.deadline > now => {
                let remaining = record.deadline - now;
                remaining.as_millis().div_ceil(1000) as i64
            }
            _ => -1,
        }
    }

    /// Returns the expiration record for a live key, if it has one.
    pub fn expiry_record(&self, key: &str) -> Option<ExpiryRecord> {
        let now = Instant::now();
        let keyspace = self.read();
        keyspace
            .expires
            .get(key)
            .filter(|record| record.deadline > now)
            .copied()
    }

    /// Returns the type name of the value under `key`, or `None` if absent.
    pub fn key_type(&self, key: &str) -> Option<&'static str> {
        let keyspace = self.read();
        keyspace.live(key, Instant::now()).map(Value::type_name)
    }

    /// Adds entries to the sorted set stored under `key`.
    ///
    /// Creates the set if the key is absent. Every entry is appended, even
    /// if the member is already present.
    ///
    /// # Returns
    ///
    /// Returns the number of entries inserted, or `WrongType` if the key holds
    /// a byte string, in which case nothing is changed.
    pub fn zadd(&self, key: &str, entries: &[(f64, Bytes)]) -> Result<usize, StoreError> {
        let mut keyspace = self.write();
        self.purge_if_expired(&mut keyspace, key, Instant::now());

        match keyspace.data.get_mut(key) {
            Some(value) => {
                let set = value.as_sorted_set_mut()?;
                for (score, member) in entries {
                    set.insert(*score, member.clone());
                }
            }
            None => {
                if entries.is_empty() {
                    return Ok(0);
                }
                let mut set = SortedSet::new();
                for (score, member) in entries {
                    set.insert(*score, member.clone());
                }
                keyspace.data.insert(key.to_string(), Value::SortedSet(set));
            }
        }

        Ok(entries.len())
    }

    /// Returns the entries of the sorted set with `min <= score <= max`, in
    /// ascending score order.
    ///
    /// An absent key yields an empty result.
    pub fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let keyspace = self.read();
        match keyspace.live(key, Instant::now()) {
            Some(value) => Ok(value.as_sorted_set()?.range_by_score(min, max).collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the entries of the sorted set between ranks `start` and
    /// `stop` inclusive. Negative ranks count from the end.
    ///
    /// An absent key yields an empty result.
    pub fn zrange_by_rank(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let keyspace = self.read();
        match keyspace.live(key, Instant::now()) {
            Some(value) => Ok(value.as_sorted_set()?.range_by_rank(start, stop).collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the number of keys held.
    ///
    /// Keys whose deadline has passed are counted until they are reclaimed.
    pub fn len(&self) -> u64 {
        self.read().data.len() as u64
    }

    /// Returns true if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        let keyspace = self.read();
        StorageStats {
            keys: keyspace.data.len() as u64,
            volatile_keys: keyspace.expires.len() as u64,
            pending_timers: keyspace.timers.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Deadline of the earliest queued timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.read()
            .timers
            .peek()
            .map(|Reverse(timer)| timer.deadline)
    }

    /// Fires up to `limit` timers whose deadline is at or before `now`.
    ///
    /// A timer deletes its key only if the key's record still carries the
    /// timer's generation. This is called by the background expiry sweeper.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were removed.
    pub fn fire_due_timers(&self, now: Instant, limit: usize) -> u64 {
        let mut keyspace = self.write();
        let mut removed = 0u64;

        for _ in 0..limit {
            match keyspace.timers.peek() {
                Some(Reverse(timer)) if timer.deadline <= now => {}
                _ => break,
            }
            let Some(Reverse(timer)) = keyspace.timers.pop() else {
                break;
            };

            let current = keyspace
                .expires
                .get(&timer.key)
                .is_some_and(|record| record.generation == timer.generation);
            if current && keyspace.remove(&timer.key) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Resolves once a timer has been queued since the last call.
    pub(crate) async fn timer_added(&self) {
        self.timer_added.notified().await;
    }
}
