//! Packed value strings, one per field.
//!
//! Record `i` of a field lives at byte offset `9 * i` and belongs to rank `i`
//! of the series' time index. A column never knows about the index itself; the
//! engine keeps every column of a series the same length as its index.

use bytes::{Bytes, BytesMut};

use crate::codec::{self, NIL_RECORD, RECORD_SIZE, RecordBytes};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldColumn {
    data: BytesMut,
}

impl FieldColumn {
    pub fn new() -> Self {
        Self::default()
    }

    /// A column of `len` nil records.
    pub fn nil(len: usize) -> Self {
        let mut column = Self::new();
        column.pad_to(len);
        column
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % RECORD_SIZE != 0 {
            return Err(Error::Format(format!(
                "field string of {} bytes is not a whole number of records",
                data.len()
            )));
        }
        Ok(Self {
            data: BytesMut::from(data),
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.len() / RECORD_SIZE
    }

    /// Length of the packed string in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn get_record(&self, rank: usize) -> Option<&[u8]> {
        let offset = rank * RECORD_SIZE;
        self.data.get(offset..offset + RECORD_SIZE)
    }

    /// Value at `rank`, NaN for nil or missing slots.
    pub fn value(&self, rank: usize) -> f64 {
        self.get_record(rank)
            .and_then(|record| codec::decode_value(record).ok())
            .unwrap_or(f64::NAN)
    }

    pub fn append(&mut self, record: &RecordBytes) {
        self.data.extend_from_slice(record);
    }

    /// Replaces the record at `rank`, which must already exist.
    pub fn overwrite(&mut self, rank: usize, record: &RecordBytes) -> Result<()> {
        let len = self.len();
        let offset = rank * RECORD_SIZE;
        let slot = self.data.get_mut(offset..offset + RECORD_SIZE).ok_or_else(|| {
            Error::InvalidValue(format!(
                "rank {} out of bounds for field of {} records",
                rank, len
            ))
        })?;
        slot.copy_from_slice(record);
        Ok(())
    }

    /// Inserts a record at `rank`, shifting every record at or above it one slot
    /// to the right. Inserting at `len()` appends.
    pub fn insert_at(&mut self, rank: usize, record: &RecordBytes) -> Result<()> {
        let len = self.len();
        if rank > len {
            return Err(Error::InvalidValue(format!(
                "rank {} out of bounds for field of {} records",
                rank, len
            )));
        }
        if rank == len {
            self.append(record);
            return Ok(());
        }
        let offset = rank * RECORD_SIZE;
        let tail = self.data.split_off(offset);
        self.data.extend_from_slice(record);
        self.data.unsplit(tail);
        Ok(())
    }

    /// Appends nil records until the column holds `len` records.
    pub fn pad_to(&mut self, len: usize) {
        while self.len() < len {
            self.append(&NIL_RECORD);
        }
    }

    /// Values of ranks `[start, end]`, NaN for nil slots and for ranks past the
    /// end of the column. The result always has `end - start + 1` values.
    pub fn read_range(&self, start: usize, end: usize) -> Vec<f64> {
        if end < start {
            return Vec::new();
        }
        (start..=end).map(|rank| self.value(rank)).collect()
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }
}
