//! Score-Ordered Sorted Set
//!
//! A sorted set keeps `(score, member)` entries ordered by score. Entries are
//! never deduplicated: every insert appends a new entry, so the same member can
//! appear several times, with the same or different scores.
//!
//! ## Layout
//!
//! ```text
//! BTreeMap<(OrderedFloat<f64>, seq), Bytes>
//!            │                 │
//!            │                 └── insertion counter, breaks score ties
//!            └── total order over f64 scores
//! ```
//!
//! The insertion counter makes every map key unique and keeps entries with equal
//! scores in the order they were added.

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A single entry returned by range queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub score: f64,
    pub member: Bytes,
}

impl ScoredMember {
    pub fn new(score: f64, member: impl Into<Bytes>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

type EntryKey = (OrderedFloat<f64>, u64);

/// An ordered collection of scored members.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    entries: BTreeMap<EntryKey, Bytes>,
    /// Next insertion sequence number
    next_seq: u64,
}

impl SortedSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry in O(log n).
    ///
    /// Duplicate scores and duplicate members are both permitted.
    pub fn insert(&mut self, score: f64, member: Bytes) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((OrderedFloat(score), seq), member);
    }

    /// Number of entries in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in ascending score order.
    pub fn iter(&self) -> impl Iterator<Item = ScoredMember> + '_ {
        self.entries.iter().map(to_scored)
    }

    /// Iterates over entries with `start <= score <= stop`, ascending.
    ///
    /// Iteration begins at the first entry whose score is at least `start`
    /// and stops at the first entry whose score exceeds `stop`.
    pub fn range_by_score(&self, start: f64, stop: f64) -> impl Iterator<Item = ScoredMember> + '_ {
        let stop = OrderedFloat(stop);
        self.entries
            .range((Bound::Included((OrderedFloat(start), 0)), Bound::Unbounded))
            .take_while(move |((score, _), _)| *score <= stop)
            .map(to_scored)
    }

    /// Iterates over entries by rank, both ends inclusive.
    ///
    /// Negative indices count from the end (`-1` is the last entry). Indices
    /// are clamped into `[0, len - 1]`; if `start > stop` after clamping the
    /// iterator is empty.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> impl Iterator<Item = ScoredMember> + '_ {
        let (skip, take) = match clamp_rank_range(start, stop, self.entries.len()) {
            Some((start, stop)) => (start, stop - start + 1),
            None => (0, 0),
        };
        self.entries.iter().skip(skip).take(take).map(to_scored)
    }
}

fn to_scored(((score, _), member): (&EntryKey, &Bytes)) -> ScoredMember {
    ScoredMember {
        score: score.into_inner(),
        member: member.clone(),
    }
}

/// Resolves a possibly negative `[start, stop]` rank range against `len`.
///
/// Returns `None` when the range selects nothing.
fn clamp_rank_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if stop < 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}
