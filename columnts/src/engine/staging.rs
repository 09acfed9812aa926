use std::collections::BTreeMap;

use bytes::Bytes;
use common::{Record, RecordOp, Storage, StorageRead};

use crate::error::{Error, Result};

/// Write overlay for one engine batch.
///
/// Reads see the batch's own earlier writes; nothing reaches storage until
/// [`Staging::into_ops`] is applied as a single atomic batch.
pub(crate) struct Staging<'a> {
    storage: &'a dyn Storage,
    writes: BTreeMap<Bytes, Option<Bytes>>,
}

impl<'a> Staging<'a> {
    pub(crate) fn new(storage: &'a dyn Storage) -> Self {
        Self {
            storage,
            writes: BTreeMap::new(),
        }
    }

    pub(crate) async fn get(&self, key: &Bytes) -> Result<Option<Bytes>> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        let record = self
            .storage
            .get(key.clone())
            .await
            .map_err(|e| Error::RemoteExecution(e.to_string()))?;
        Ok(record.map(|r| r.value))
    }

    pub(crate) fn put(&mut self, key: Bytes, value: Bytes) {
        self.writes.insert(key, Some(value));
    }

    pub(crate) fn delete(&mut self, key: Bytes) {
        self.writes.insert(key, None);
    }

    pub(crate) fn into_ops(self) -> Vec<RecordOp> {
        self.writes
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => RecordOp::Put(Record::new(key, value)),
                None => RecordOp::Delete(key),
            })
            .collect()
    }
}
