//! In-memory stream storage for the candidate endpoint.
//!
//! Streams are append-only maps from [`EntryId`] to an insertion-ordered
//! field/value map. Ordering is the numeric `(timestamp, sequence)` order,
//! not the lexical order of the rendered ID.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};
use std::time::{SystemTime, SystemTimeError};

use indexmap::IndexMap;

/// Field/value content of a single stream entry, in insertion order.
pub type Fields = IndexMap<String, String>;

/// One stream entry as returned by read operations.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Fields,
}

/// Result of a read: one `(stream name, entries)` pair per stream that had
/// qualifying entries, in request order.
pub type ReadResult = Vec<(String, Vec<StreamEntry>)>;

/// A two-part stream entry identifier, totally ordered by
/// `(milliseconds, sequence)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    pub fn new(ms: u64, seq: u64) -> Self {
        EntryId { ms, seq }
    }

    /// Parses a literal `<ms>-<seq>` identifier.
    ///
    /// The string form must split into exactly two numeric parts.
    pub fn parse(input: &str) -> Result<Self, String> {
        let parts = input.split('-').collect::<Vec<&str>>();

        if parts.len() != 2 {
            return Err("Invalid stream ID format".to_string());
        }

        let ms = parts[0]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID format".to_string())?;
        let seq = parts[1]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID format".to_string())?;

        Ok(EntryId { ms, seq })
    }

    fn next_seq(self) -> EntryId {
        EntryId {
            ms: self.ms,
            seq: self.seq + 1,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// The ID argument accepted by an append.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdSpec {
    /// `*` - both parts generated from the clock.
    Auto,
    /// `<ms>-*` - explicit timestamp, generated sequence.
    AutoSeq(u64),
    /// `<ms>-<seq>` - fully explicit.
    Explicit(EntryId),
}

impl IdSpec {
    pub fn parse(input: &str) -> Result<Self, String> {
        if input == "*" {
            return Ok(IdSpec::Auto);
        }

        let parts = input.split('-').collect::<Vec<&str>>();

        if parts.len() != 2 {
            return Err("Invalid stream ID format".to_string());
        }

        let ms = parts[0]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID format".to_string())?;

        if parts[1] == "*" {
            return Ok(IdSpec::AutoSeq(ms));
        }

        let seq = parts[1]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID format".to_string())?;

        Ok(IdSpec::Explicit(EntryId { ms, seq }))
    }
}

#[derive(Debug, Default)]
pub struct StreamStore {
    streams: HashMap<String, BTreeMap<EntryId, Fields>>,
}

impl StreamStore {
    pub fn new() -> Self {
        StreamStore {
            streams: HashMap::new(),
        }
    }

    /// Appends an entry, resolving the ID spec against the stream's current
    /// top entry. Returned IDs on one stream are strictly increasing.
    pub fn append(&mut self, key: &str, spec: IdSpec, fields: Fields) -> Result<EntryId, String> {
        let last = self.last_id(key);

        let id = match spec {
            IdSpec::Auto => {
                let now = timestamp_in_milliseconds()
                    .map_err(|_| "System time is before unix epoch".to_string())?;

                match last {
                    // Clock went backwards or several appends landed in the
                    // same millisecond: bump the sequence instead.
                    Some(top) if top.ms >= now => top.next_seq(),
                    _ => EntryId::new(now, 0),
                }
            }
            IdSpec::AutoSeq(ms) => match last {
                Some(top) if ms < top.ms => {
                    return Err(
                        "The ID specified in XADD is equal or smaller than the target stream top item"
                            .to_string(),
                    );
                }
                Some(top) if ms == top.ms => top.next_seq(),
                _ => {
                    // 0-0 is never a valid entry ID.
                    let seq = if ms == 0 { 1 } else { 0 };
                    EntryId::new(ms, seq)
                }
            },
            IdSpec::Explicit(id) => {
                if id == EntryId::ZERO {
                    return Err("The ID specified in XADD must be greater than 0-0".to_string());
                }

                if let Some(top) = last {
                    if id <= top {
                        return Err(
                            "The ID specified in XADD is equal or smaller than the target stream top item"
                                .to_string(),
                        );
                    }
                }

                id
            }
        };

        self.streams
            .entry(key.to_string())
            .or_default()
            .insert(id, fields);

        Ok(id)
    }

    /// Returns entries with IDs strictly greater than `cursor`, in increasing
    /// order, capped at `count` entries when given.
    pub fn entries_after(
        &self,
        key: &str,
        cursor: EntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        let Some(stream) = self.streams.get(key) else {
            return Vec::new();
        };

        let entries = stream.range((Excluded(cursor), Unbounded)).map(|(id, fields)| StreamEntry {
            id: *id,
            fields: fields.clone(),
        });

        match count {
            Some(n) => entries.take(n).collect(),
            None => entries.collect(),
        }
    }

    /// The largest entry ID in the stream, if any.
    pub fn last_id(&self, key: &str) -> Option<EntryId> {
        self.streams
            .get(key)
            .and_then(|stream| stream.keys().next_back().copied())
    }

    /// Number of entries currently held in the stream.
    pub fn len(&self, key: &str) -> usize {
        self.streams.get(key).map(|stream| stream.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }
}

fn timestamp_in_milliseconds() -> Result<u64, SystemTimeError> {
    let duration_since_epoch = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;

    Ok(duration_since_epoch.as_millis() as u64)
}
