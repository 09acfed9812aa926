//! Storage primitives shared by the ColumnTS crates.
//!
//! The [`Storage`] trait is the narrow key-value surface the atomic engine is
//! built on: point reads, ordered scans and atomic batches of puts/deletes.

pub mod storage;
pub mod util;

pub use storage::config::{
    AwsObjectStoreConfig, LocalObjectStoreConfig, ObjectStoreConfig, SlateDbStorageConfig,
    StorageConfig,
};
pub use storage::{
    Record, RecordOp, Storage, StorageError, StorageIterator, StorageRead, StorageResult,
    WriteOptions,
};
pub use util::BytesRange;
