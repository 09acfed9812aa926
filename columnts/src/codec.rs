//! Fixed-width binary value records.
//!
//! Every value stored in a field string is a 9-byte record:
//!
//! ```text
//! | tag (u8) | payload (f64 BE) |
//! ```
//!
//! The payload is the big-endian IEEE-754 bit pattern of the value when the
//! tag is [`Tag::Double`] and zero otherwise. Readers never fail on a tag they
//! do not know; such slots read back as nil.

use crate::error::{Error, Result};

/// Size in bytes of one encoded record.
pub const RECORD_SIZE: usize = 9;

/// One encoded record.
pub type RecordBytes = [u8; RECORD_SIZE];

/// Record tag stored in byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Zero-filled slot. Reads as nil.
    Empty,
    /// Explicit missing value.
    Nil,
    /// A double value.
    Double,
    /// A tag written by a newer writer.
    Unknown(u8),
}

impl Tag {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Tag::Empty,
            0x01 => Tag::Nil,
            0x02 => Tag::Double,
            other => Tag::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Tag::Empty => 0x00,
            Tag::Nil => 0x01,
            Tag::Double => 0x02,
            Tag::Unknown(other) => other,
        }
    }

    /// Whether a slot with this tag carries a value.
    pub fn is_present(self) -> bool {
        self == Tag::Double
    }
}

/// The record written for "no value at this rank".
pub const NIL_RECORD: RecordBytes = [0x01, 0, 0, 0, 0, 0, 0, 0, 0];

/// Encodes a tagged value. The payload is zeroed unless the tag is `Double`.
pub fn encode(tag: Tag, value: f64) -> RecordBytes {
    let mut record = [0u8; RECORD_SIZE];
    record[0] = tag.to_byte();
    if tag.is_present() {
        record[1..].copy_from_slice(&value.to_be_bytes());
    }
    record
}

/// Decodes a record, mapping every non-`Double` tag to NaN.
pub fn decode(buf: &[u8]) -> Result<(Tag, f64)> {
    let record: &RecordBytes = buf.try_into().map_err(|_| {
        Error::Format(format!(
            "record must be exactly {} bytes, got {}",
            RECORD_SIZE,
            buf.len()
        ))
    })?;
    let tag = Tag::from_byte(record[0]);
    let value = if tag.is_present() {
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&record[1..]);
        f64::from_be_bytes(payload)
    } else {
        f64::NAN
    };
    Ok((tag, value))
}

/// Encodes a user value. NaN is stored as an explicit nil record so it is
/// never counted by statistics.
pub fn encode_value(value: f64) -> RecordBytes {
    if value.is_nan() {
        NIL_RECORD
    } else {
        encode(Tag::Double, value)
    }
}

/// Decodes a record to its value, NaN for anything that is not a double.
pub fn decode_value(buf: &[u8]) -> Result<f64> {
    decode(buf).map(|(_, value)| value)
}
