//! Ordered, deduplicated timestamps shared by all fields of a series.
//!
//! The rank of a timestamp is its zero-based position in the index. Ranks are
//! dense and follow timestamp order, so inserting a new timestamp shifts every
//! higher rank by one.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::model::Timestamp;
use crate::serde::{Reader, ValueType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeIndex {
    timestamps: Vec<Timestamp>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn as_slice(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn get(&self, rank: usize) -> Option<Timestamp> {
        self.timestamps.get(rank).copied()
    }

    pub fn rank_of(&self, timestamp: Timestamp) -> Option<usize> {
        self.timestamps.binary_search(&timestamp).ok()
    }

    /// Inserts `timestamp`, returning its rank and whether it was new.
    pub fn insert(&mut self, timestamp: Timestamp) -> (usize, bool) {
        match self.timestamps.binary_search(&timestamp) {
            Ok(rank) => (rank, false),
            Err(rank) => {
                self.timestamps.insert(rank, timestamp);
                (rank, true)
            }
        }
    }

    pub fn front(&self) -> Option<Timestamp> {
        self.timestamps.first().copied()
    }

    pub fn back(&self) -> Option<Timestamp> {
        self.timestamps.last().copied()
    }

    /// Smallest rank span enclosing every timestamp within `[start, end]`.
    pub fn rank_span(&self, start: Timestamp, end: Timestamp) -> Option<(usize, usize)> {
        if end < start {
            return None;
        }
        let a = self.timestamps.partition_point(|t| *t < start);
        let b = self.timestamps.partition_point(|t| *t <= end);
        if a < b { Some((a, b - 1)) } else { None }
    }

    /// Resolves an inclusive rank window where negative ranks count from the end
    /// (`-1` is the last rank). Out-of-bounds ends are clamped.
    pub fn resolve(&self, start: i64, end: i64) -> Option<(usize, usize)> {
        let n = self.timestamps.len() as i64;
        if n == 0 {
            return None;
        }
        let start = if start < 0 { (start + n).max(0) } else { start };
        let end = if end < 0 { end + n } else { end.min(n - 1) };
        if start > end || start >= n {
            return None;
        }
        Some((start as usize, end as usize))
    }

    /// Encodes the index as a marker byte followed by big-endian timestamps.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 8 * self.timestamps.len());
        buf.put_u8(ValueType::TimeIndex as u8);
        for timestamp in &self.timestamps {
            buf.put_i64(*timestamp);
        }
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let payload = ValueType::TimeIndex.strip(data)?;
        if payload.len() % 8 != 0 {
            return Err(Error::Format(format!(
                "time index payload of {} bytes is not a multiple of 8",
                payload.len()
            )));
        }
        let mut reader = Reader::new(payload);
        let mut timestamps = Vec::with_capacity(payload.len() / 8);
        while !reader.is_empty() {
            let timestamp = reader.i64("timestamp")?;
            if timestamps.last().is_some_and(|last| *last >= timestamp) {
                return Err(Error::Format(format!(
                    "time index out of order at timestamp {}",
                    timestamp
                )));
            }
            timestamps.push(timestamp);
        }
        Ok(Self { timestamps })
    }
}

impl FromIterator<Timestamp> for TimeIndex {
    fn from_iter<I: IntoIterator<Item = Timestamp>>(iter: I) -> Self {
        let mut timestamps: Vec<Timestamp> = iter.into_iter().collect();
        timestamps.sort_unstable();
        timestamps.dedup();
        Self { timestamps }
    }
}
