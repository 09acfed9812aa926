//! Key-value storage abstraction.
//!
//! Backends implement [`StorageRead`] for point lookups and ordered scans, and
//! [`Storage`] for atomic write batches. Every batch passed to
//! [`Storage::apply`] becomes visible all at once or not at all.

pub mod config;
pub mod factory;
pub mod in_memory;
pub mod slate;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::BytesRange;

/// A key/value pair read from or written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

impl Record {
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}

/// A single operation inside an atomic write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOp {
    Put(Record),
    Delete(Bytes),
}

/// Options for write batches.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Whether to wait for the batch to be durable before returning.
    pub await_durable: bool,
}

/// Errors raised by storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backend reported a failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invariant violated inside the storage layer itself.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Wraps any backend error as [`StorageError::Storage`].
    pub fn from_storage(err: impl std::fmt::Display) -> Self {
        StorageError::Storage(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Iterator over records returned by a scan, in key order.
#[async_trait]
pub trait StorageIterator {
    async fn next(&mut self) -> StorageResult<Option<Record>>;
}

/// Read operations over a key-value store.
#[async_trait]
pub trait StorageRead: Send + Sync {
    /// Retrieves a single record by key, `None` when the key does not exist.
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>>;

    /// Returns an iterator over all records in `range`, in key order.
    async fn scan_iter(
        &self,
        range: BytesRange,
    ) -> StorageResult<Box<dyn StorageIterator + Send + 'static>>;

    /// Collects all records in `range`.
    async fn scan(&self, range: BytesRange) -> StorageResult<Vec<Record>> {
        let mut iter = self.scan_iter(range).await?;
        let mut records = Vec::new();
        while let Some(record) = iter.next().await? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Read-write key-value store with atomic batches.
#[async_trait]
pub trait Storage: StorageRead {
    /// Applies all operations as one atomic batch.
    async fn apply(&self, ops: Vec<RecordOp>) -> StorageResult<()> {
        self.apply_with_options(ops, WriteOptions::default()).await
    }

    /// Applies all operations as one atomic batch with the given options.
    async fn apply_with_options(
        &self,
        ops: Vec<RecordOp>,
        options: WriteOptions,
    ) -> StorageResult<()>;

    /// Writes records as one atomic batch.
    async fn put(&self, records: Vec<Record>) -> StorageResult<()> {
        self.apply(records.into_iter().map(RecordOp::Put).collect())
            .await
    }

    /// Flushes buffered writes to durable storage.
    async fn flush(&self) -> StorageResult<()>;

    /// Closes the storage, flushing outstanding writes.
    async fn close(&self) -> StorageResult<()>;
}
