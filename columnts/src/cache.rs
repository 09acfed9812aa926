//! Client-side buffer of uncommitted series writes.
//!
//! A [`WriteCache`] collects point writes and at most one pending merge for a
//! single series. Nothing in it is visible to readers. At flush time the owning
//! session takes the buffered writes out of the cache, so writes made while the
//! flush is in flight stay buffered for the next one. A failed flush puts the
//! taken writes back underneath them.

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::encode_value;
use crate::engine::{Procedure, ScriptCall};
use crate::error::Result;
use crate::model::Timestamp;
use crate::serde::args::{FieldFilter, InsertBatch, InsertEntry, MergeDescriptor};
use crate::serde::key::{SeriesKey, validate_field_name};

/// A merge waiting to be flushed into the owning series.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMerge {
    pub descriptor: MergeDescriptor,
    pub fields: FieldFilter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteCache {
    fields: BTreeMap<String, BTreeMap<Timestamp, f64>>,
    timestamps: BTreeSet<Timestamp>,
    merge: Option<PendingMerge>,
}

impl WriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `value` for `field` at `timestamp`. NaN marks a nil value.
    pub fn add(&mut self, timestamp: Timestamp, field: impl Into<String>, value: f64) -> Result<()> {
        let field = field.into();
        validate_field_name(&field)?;
        self.insert(timestamp, field, value);
        Ok(())
    }

    /// Buffers several fields at one timestamp. Nothing is buffered if any
    /// field name is invalid.
    pub fn add_fields<I, K>(&mut self, timestamp: Timestamp, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.add_rows([(timestamp, values)])
    }

    /// Buffers one row of fields per timestamp. Nothing is buffered if any
    /// field name is invalid.
    pub fn add_rows<R, I, K>(&mut self, rows: R) -> Result<()>
    where
        R: IntoIterator<Item = (Timestamp, I)>,
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut points = Vec::new();
        for (timestamp, values) in rows {
            for (field, value) in values {
                let field = field.into();
                validate_field_name(&field)?;
                points.push((timestamp, field, value));
            }
        }
        for (timestamp, field, value) in points {
            self.insert(timestamp, field, value);
        }
        Ok(())
    }

    fn insert(&mut self, timestamp: Timestamp, field: String, value: f64) {
        self.fields.entry(field).or_default().insert(timestamp, value);
        self.timestamps.insert(timestamp);
    }

    /// Replaces any pending merge.
    pub fn set_merge(&mut self, merge: PendingMerge) {
        self.merge = Some(merge);
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() && self.merge.is_none()
    }

    /// Number of buffered values for `field`.
    pub fn pending_values(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, BTreeMap::len)
    }

    pub fn pending_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
        self.timestamps.clear();
        self.merge = None;
    }

    /// Moves every buffered write out, leaving the cache empty.
    pub fn take(&mut self) -> WriteCache {
        std::mem::take(self)
    }

    /// Puts back writes taken by [`WriteCache::take`]. Values buffered since
    /// then win over the restored ones.
    pub fn restore(&mut self, taken: WriteCache) {
        for (field, values) in taken.fields {
            let current = self.fields.entry(field).or_default();
            for (timestamp, value) in values {
                current.entry(timestamp).or_insert(value);
            }
        }
        self.timestamps.extend(taken.timestamps);
        if self.merge.is_none() {
            self.merge = taken.merge;
        }
    }

    /// The insert batch holding every buffered point, one entry per touched timestamp.
    pub fn insert_batch(&self) -> InsertBatch {
        let entries = self
            .timestamps
            .iter()
            .map(|timestamp| InsertEntry {
                timestamp: *timestamp,
                fields: self
                    .fields
                    .iter()
                    .filter_map(|(field, values)| {
                        values
                            .get(timestamp)
                            .map(|value| (field.clone(), encode_value(*value)))
                    })
                    .collect(),
            })
            .collect();
        InsertBatch { entries }
    }

    /// Serializes the cache into engine calls against `key`.
    ///
    /// A pending merge is flushed before buffered points, so points added
    /// alongside a merge overwrite the merged values at their timestamps.
    pub fn to_calls(&self, key: &SeriesKey) -> Result<Vec<ScriptCall>> {
        let mut calls = Vec::with_capacity(2);
        if let Some(merge) = &self.merge {
            calls.push(ScriptCall::new(
                Procedure::Merge,
                key.id(),
                vec![merge.descriptor.serialize()?, merge.fields.serialize()?],
            ));
        }
        if !self.timestamps.is_empty() {
            calls.push(ScriptCall::new(
                Procedure::InsertUpdate,
                key.id(),
                vec![self.insert_batch().serialize()?],
            ));
        }
        Ok(calls)
    }
}
