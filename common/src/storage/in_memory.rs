use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    Record, RecordOp, Storage, StorageError, StorageIterator, StorageRead, StorageResult,
    WriteOptions,
};
use crate::BytesRange;

/// In-memory storage backed by an ordered map.
///
/// Batches are applied under a single write lock, so readers never observe a
/// partially applied batch.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    data: RwLock<BTreeMap<Bytes, Bytes>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_lock(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, BTreeMap<Bytes, Bytes>>> {
        self.data
            .read()
            .map_err(|e| StorageError::Internal(format!("poisoned lock: {}", e)))
    }
}

#[async_trait]
impl StorageRead for InMemoryStorage {
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>> {
        let data = self.read_lock()?;
        Ok(data
            .get(&key)
            .map(|value| Record::new(key.clone(), value.clone())))
    }

    async fn scan_iter(
        &self,
        range: BytesRange,
    ) -> StorageResult<Box<dyn StorageIterator + Send + 'static>> {
        let data = self.read_lock()?;
        let records = data
            .range(range)
            .map(|(k, v)| Record::new(k.clone(), v.clone()))
            .collect();
        Ok(Box::new(InMemoryIterator { records }))
    }
}

struct InMemoryIterator {
    records: VecDeque<Record>,
}

#[async_trait]
impl StorageIterator for InMemoryIterator {
    async fn next(&mut self) -> StorageResult<Option<Record>> {
        Ok(self.records.pop_front())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn apply_with_options(
        &self,
        ops: Vec<RecordOp>,
        _options: WriteOptions,
    ) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(format!("poisoned lock: {}", e)))?;
        for op in ops {
            match op {
                RecordOp::Put(record) => {
                    data.insert(record.key, record.value);
                }
                RecordOp::Delete(key) => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
