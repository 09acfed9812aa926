//! Storage keys for one series.
//!
//! ```text
//! TimeIndex: | version | 0x01 | id |
//! FieldSet:  | version | 0x02 | id |
//! FieldData: | version | 0x03 | id | ':' | field |
//! ```
//!
//! Field keys are derived from the series id and the field name so the engine
//! can address them without an extra lookup. Series ids may contain ':' but
//! field names may not, so a field key splits unambiguously at its last ':'.

use bytes::{BufMut, Bytes, BytesMut};

use super::{KEY_VERSION, RecordType};
use crate::error::{Error, Result};
use common::BytesRange;

/// Separator between the series id and the field name in field keys.
pub const FIELD_SEPARATOR: u8 = b':';

/// Rejects field names whose key could collide with another series' field.
pub fn validate_field_name(field: &str) -> Result<()> {
    if field.as_bytes().contains(&FIELD_SEPARATOR) {
        return Err(Error::InvalidValue(format!(
            "field name '{}' must not contain '{}'",
            field, FIELD_SEPARATOR as char
        )));
    }
    Ok(())
}

/// The keys that make up one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    id: String,
}

impl SeriesKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn prefixed(&self, record_type: RecordType, extra: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(2 + self.id.len() + extra);
        buf.put_u8(KEY_VERSION);
        buf.put_u8(record_type.id());
        buf.put_slice(self.id.as_bytes());
        buf
    }

    /// Key of the ordered timestamp index.
    pub fn time_index(&self) -> Bytes {
        self.prefixed(RecordType::TimeIndex, 0).freeze()
    }

    /// Key of the set of field names.
    pub fn field_set(&self) -> Bytes {
        self.prefixed(RecordType::FieldSet, 0).freeze()
    }

    /// Key of the packed records of one field.
    pub fn field(&self, field: &str) -> Bytes {
        let mut buf = self.prefixed(RecordType::FieldData, 1 + field.len());
        buf.put_u8(FIELD_SEPARATOR);
        buf.put_slice(field.as_bytes());
        buf.freeze()
    }

    /// Range covering the time index key of every series.
    pub fn all_time_indexes() -> BytesRange {
        BytesRange::prefix(Bytes::copy_from_slice(&[KEY_VERSION, RecordType::TimeIndex.id()]))
    }

    /// Decodes the series id from a time index key.
    pub fn from_time_index(data: &[u8]) -> Result<Self> {
        match data {
            [KEY_VERSION, type_id, id @ ..] => {
                let record_type = RecordType::from_id(*type_id)?;
                if record_type != RecordType::TimeIndex {
                    return Err(Error::Format(format!(
                        "invalid record type: expected TimeIndex, got {:?}",
                        record_type
                    )));
                }
                let id = String::from_utf8(id.to_vec())
                    .map_err(|e| Error::Format(format!("invalid series id: {}", e)))?;
                Ok(Self { id })
            }
            [version, ..] => Err(Error::Format(format!(
                "unsupported key version: 0x{:02x}",
                version
            ))),
            [] => Err(Error::Format("empty key".to_string())),
        }
    }
}
