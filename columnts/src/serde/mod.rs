//! Serde for ColumnTS storage and procedure arguments.
//!
//! # Key Format
//!
//! All keys start with a version byte and record type discriminator:
//!
//! ```text
//! | version (u8) | type (u8) | ... record-specific fields ... |
//! ```
//!
//! # Record Types
//!
//! - `TimeIndex` (0x01): the ordered timestamps of one series
//! - `FieldSet` (0x02): the names of the fields known to one series
//! - `FieldData` (0x03): the packed 9-byte records of one field
//!
//! # Value Format
//!
//! Time index and field set values start with a [`ValueType`] marker byte so
//! a reader can tell when a key holds something else. Field data carries no
//! marker: it is exactly `9 × N` bytes. All integers are big-endian and
//! strings are `len: u16` followed by UTF-8 bytes.

pub mod args;
pub mod key;

use std::collections::BTreeSet;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{RECORD_SIZE, RecordBytes};
use crate::error::{Error, Result};

/// Key format version (currently 0x01)
pub const KEY_VERSION: u8 = 0x01;

/// Record type discriminators for ColumnTS keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    TimeIndex = 0x01,
    FieldSet = 0x02,
    FieldData = 0x03,
}

impl RecordType {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0x01 => Ok(RecordType::TimeIndex),
            0x02 => Ok(RecordType::FieldSet),
            0x03 => Ok(RecordType::FieldData),
            _ => Err(Error::Format(format!("invalid record type: 0x{:02x}", id))),
        }
    }
}

/// Marker byte at the start of structured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    TimeIndex = 0x54,
    FieldSet = 0x46,
}

impl ValueType {
    /// Checks the marker and returns the remaining payload.
    pub fn strip<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        match data.split_first() {
            Some((marker, rest)) if *marker == *self as u8 => Ok(rest),
            Some((marker, _)) => Err(Error::Format(format!(
                "expected {:?} value, found marker 0x{:02x}",
                self, marker
            ))),
            None => Err(Error::Format(format!("empty {:?} value", self))),
        }
    }
}

/// Writes a `u16`-length-prefixed UTF-8 string.
pub fn put_utf8(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| Error::InvalidValue(format!("string too long: {} bytes", s.len())))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Cursor over an encoded buffer that reports short reads as format errors.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(Error::Format(format!(
                "buffer too short for {}: need {} bytes, have {}",
                what,
                n,
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i64(&mut self, what: &str) -> Result<i64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, what)?);
        Ok(i64::from_be_bytes(b))
    }

    pub fn f64(&mut self, what: &str) -> Result<f64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, what)?);
        Ok(f64::from_be_bytes(b))
    }

    pub fn utf8(&mut self, what: &str) -> Result<String> {
        let len = self.u16(what)? as usize;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Format(format!("invalid UTF-8 in {}: {}", what, e)))
    }

    pub fn record(&mut self, what: &str) -> Result<RecordBytes> {
        let mut record = [0u8; RECORD_SIZE];
        record.copy_from_slice(self.take(RECORD_SIZE, what)?);
        Ok(record)
    }

    /// Fails if any bytes are left over.
    pub fn finish(self, what: &str) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::Format(format!(
                "{} trailing bytes after {}",
                self.buf.len(),
                what
            )))
        }
    }
}

/// Value of a field set record: the sorted names of a series' fields.
///
/// ```text
/// | marker (u8='F') | count (u16) | count × utf8 |
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSetValue {
    pub fields: BTreeSet<String>,
}

impl FieldSetValue {
    pub fn serialize(&self) -> Result<Bytes> {
        let count = u16::try_from(self.fields.len())
            .map_err(|_| Error::InvalidValue(format!("too many fields: {}", self.fields.len())))?;
        let mut buf = BytesMut::new();
        buf.put_u8(ValueType::FieldSet as u8);
        buf.put_u16(count);
        for field in &self.fields {
            put_utf8(&mut buf, field)?;
        }
        Ok(buf.freeze())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(ValueType::FieldSet.strip(data)?);
        let count = reader.u16("field count")?;
        let mut fields = BTreeSet::new();
        for _ in 0..count {
            fields.insert(reader.utf8("field name")?);
        }
        reader.finish("field set")?;
        Ok(Self { fields })
    }
}
