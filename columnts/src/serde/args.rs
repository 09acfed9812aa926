//! Wire encoding of procedure arguments.
//!
//! Each procedure receives its arguments as a list of byte strings. Decoding
//! an argument validates its whole shape, so a malformed request is rejected
//! before the engine touches any key.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::key::validate_field_name;
use super::{Reader, put_utf8};
use crate::codec::RecordBytes;
use crate::error::{Error, Result};
use crate::model::Timestamp;

/// Shape marker of an insert entry whose value is a field → record mapping.
pub const SHAPE_MAPPING: u8 = 0x01;

/// One timestamp of an insert batch with the records to store at it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertEntry {
    pub timestamp: Timestamp,
    pub fields: BTreeMap<String, RecordBytes>,
}

/// Argument of `insert_update`.
///
/// ```text
/// | count (u32) | count × (ts (i64) | shape (u8) | n (u16) | n × (utf8 | record) ) |
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertBatch {
    pub entries: Vec<InsertEntry>,
}

impl InsertBatch {
    pub fn serialize(&self) -> Result<Bytes> {
        let count = u32::try_from(self.entries.len())
            .map_err(|_| Error::InvalidValue(format!("batch too large: {}", self.entries.len())))?;
        let mut buf = BytesMut::new();
        buf.put_u32(count);
        for entry in &self.entries {
            let n = u16::try_from(entry.fields.len()).map_err(|_| {
                Error::InvalidValue(format!("too many fields: {}", entry.fields.len()))
            })?;
            buf.put_i64(entry.timestamp);
            buf.put_u8(SHAPE_MAPPING);
            buf.put_u16(n);
            for (field, record) in &entry.fields {
                put_utf8(&mut buf, field)?;
                buf.put_slice(record);
            }
        }
        Ok(buf.freeze())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let count = reader.u32("insert count")?;
        let mut entries = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let timestamp = reader.i64("timestamp")?;
            let shape = reader.u8("entry shape")?;
            if shape != SHAPE_MAPPING {
                return Err(Error::InvalidType(format!(
                    "value for timestamp {} must be a field mapping, got shape 0x{:02x}",
                    timestamp, shape
                )));
            }
            let n = reader.u16("field count")?;
            let mut fields = BTreeMap::new();
            for _ in 0..n {
                let field = reader.utf8("field name")?;
                validate_field_name(&field)?;
                let record = reader.record("field record")?;
                fields.insert(field, record);
            }
            entries.push(InsertEntry { timestamp, fields });
        }
        reader.finish("insert batch")?;
        Ok(Self { entries })
    }
}

/// One weighted term of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeTerm {
    pub weight: f64,
    pub series: String,
    pub multiplier: Option<String>,
}

/// Argument describing the terms of `merge` and `merged_series`.
///
/// ```text
/// | count (u16) | count × (arity (u8) | weight (f64) | series | [multiplier]) |
/// ```
///
/// `arity` is 2 for `(weight, series)` and 3 for `(weight, series, multiplier)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeDescriptor {
    pub terms: Vec<MergeTerm>,
}

impl MergeDescriptor {
    pub fn serialize(&self) -> Result<Bytes> {
        let count = u16::try_from(self.terms.len())
            .map_err(|_| Error::InvalidValue(format!("too many terms: {}", self.terms.len())))?;
        let mut buf = BytesMut::new();
        buf.put_u16(count);
        for term in &self.terms {
            buf.put_u8(if term.multiplier.is_some() { 3 } else { 2 });
            buf.put_f64(term.weight);
            put_utf8(&mut buf, &term.series)?;
            if let Some(multiplier) = &term.multiplier {
                put_utf8(&mut buf, multiplier)?;
            }
        }
        Ok(buf.freeze())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let count = reader.u16("term count")?;
        let mut terms = Vec::with_capacity(count as usize);
        for i in 0..count {
            let arity = reader.u8("term arity")?;
            if arity != 2 && arity != 3 {
                return Err(Error::InvalidType(format!(
                    "merge term {} must be (weight, series[, multiplier]), got arity {}",
                    i, arity
                )));
            }
            let weight = reader.f64("term weight")?;
            let series = reader.utf8("term series")?;
            let multiplier = if arity == 3 {
                Some(reader.utf8("term multiplier")?)
            } else {
                None
            };
            terms.push(MergeTerm {
                weight,
                series,
                multiplier,
            });
        }
        reader.finish("merge descriptor")?;
        let descriptor = Self { terms };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// A merge needs at least two weighted terms.
    pub fn validate(&self) -> Result<()> {
        if self.terms.len() < 2 {
            return Err(Error::InvalidValue(format!(
                "merge requires at least two weighted series, got {}",
                self.terms.len()
            )));
        }
        Ok(())
    }
}

/// Optional allow-list of field names. Empty means every field.
///
/// ```text
/// | count (u16) | count × utf8 |
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFilter {
    pub fields: Vec<String>,
}

impl FieldFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keeps the names from `known` this filter selects, in `known`'s order.
    pub fn select<'a, I>(&self, known: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        known
            .into_iter()
            .filter(|name| self.is_all() || self.fields.contains(name))
            .cloned()
            .collect()
    }

    pub fn serialize(&self) -> Result<Bytes> {
        let count = u16::try_from(self.fields.len())
            .map_err(|_| Error::InvalidValue(format!("too many fields: {}", self.fields.len())))?;
        let mut buf = BytesMut::new();
        buf.put_u16(count);
        for field in &self.fields {
            put_utf8(&mut buf, field)?;
        }
        Ok(buf.freeze())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let count = reader.u16("field count")?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            fields.push(reader.utf8("field name")?);
        }
        reader.finish("field filter")?;
        Ok(Self { fields })
    }
}

/// Inclusive window, either of ranks or of timestamps depending on the procedure.
///
/// ```text
/// | start (i64) | end (i64) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Every rank, from the first to the last.
    pub fn all_ranks() -> Self {
        Self { start: 0, end: -1 }
    }

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_i64(self.start);
        buf.put_i64(self.end);
        buf.freeze()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let start = reader.i64("window start")?;
        let end = reader.i64("window end")?;
        reader.finish("window")?;
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_value;

    fn entry(timestamp: Timestamp, fields: &[(&str, f64)]) -> InsertEntry {
        InsertEntry {
            timestamp,
            fields: fields
                .iter()
                .map(|(f, v)| (f.to_string(), encode_value(*v)))
                .collect(),
        }
    }

    #[test]
    fn should_serialize_and_deserialize_insert_batch() {
        // given
        let batch = InsertBatch {
            entries: vec![
                entry(1_327_276_800, &[("open", 586.0), ("close", 585.52)]),
                entry(1_327_017_600, &[("open", 590.53)]),
            ],
        };

        // when
        let decoded = InsertBatch::deserialize(&batch.serialize().unwrap()).unwrap();

        // then
        assert_eq!(decoded, batch);
    }

    #[test]
    fn should_reject_insert_entry_that_is_not_a_mapping() {
        // given
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_i64(10);
        buf.put_u8(0x02);
        buf.put_u16(0);

        // when
        let result = InsertBatch::deserialize(&buf);

        // then
        assert!(matches!(result, Err(Error::InvalidType(_))));
    }

    #[test]
    fn should_reject_field_name_with_key_separator() {
        // given
        let batch = InsertBatch {
            entries: vec![entry(10, &[("USD:close", 1.0)])],
        };

        // when
        let result = InsertBatch::deserialize(&batch.serialize().unwrap());

        // then
        assert!(matches!(result, Err(Error::InvalidValue(_))));
    }

    #[test]
    fn should_reject_truncated_insert_batch() {
        // given
        let batch = InsertBatch {
            entries: vec![entry(10, &[("pv", 56.0)])],
        };
        let bytes = batch.serialize().unwrap();

        // when
        let result = InsertBatch::deserialize(&bytes[..bytes.len() - 3]);

        // then
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn should_serialize_and_deserialize_merge_descriptor() {
        // given
        let descriptor = MergeDescriptor {
            terms: vec![
                MergeTerm {
                    weight: 1.5,
                    series: "ts1".to_string(),
                    multiplier: Some("eurusd".to_string()),
                },
                MergeTerm {
                    weight: -1.2,
                    series: "ts2".to_string(),
                    multiplier: None,
                },
            ],
        };

        // when
        let decoded = MergeDescriptor::deserialize(&descriptor.serialize().unwrap()).unwrap();

        // then
        assert_eq!(decoded, descriptor);
    }

    #[test]
    fn should_reject_merge_with_single_term() {
        // given
        let descriptor = MergeDescriptor {
            terms: vec![MergeTerm {
                weight: 5.0,
                series: "ts".to_string(),
                multiplier: None,
            }],
        };

        // when
        let result = MergeDescriptor::deserialize(&descriptor.serialize().unwrap());

        // then
        assert!(matches!(result, Err(Error::InvalidValue(_))));
    }

    #[test]
    fn should_reject_merge_term_with_bad_arity() {
        // given
        let mut buf = BytesMut::new();
        buf.put_u16(2);
        buf.put_u8(1);
        buf.put_f64(5.0);

        // when
        let result = MergeDescriptor::deserialize(&buf);

        // then
        assert!(matches!(result, Err(Error::InvalidType(_))));
    }

    #[test]
    fn should_select_only_known_fields() {
        // given
        let known: Vec<String> = ["high", "low", "open"].iter().map(|s| s.to_string()).collect();
        let filter = FieldFilter::only(["low", "high", "badone"]);

        // when
        let selected = filter.select(&known);

        // then
        assert_eq!(selected, vec!["high".to_string(), "low".to_string()]);
        assert_eq!(FieldFilter::all().select(&known), known);
    }
}
