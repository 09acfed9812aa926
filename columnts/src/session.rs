//! Sessions and transactions.
//!
//! A [`Session`] connects series to an engine. While a transaction is open,
//! every series written through the session registers its write cache with
//! it, and [`Session::commit`] flushes all of them in one atomic engine batch.
//! Without an open transaction each write is flushed as soon as it is made.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::WriteCache;
use crate::engine::{ScriptCall, ScriptHost, ScriptResponse};
use crate::error::{Error, Result};
use crate::serde::key::SeriesKey;

/// Write cache shared between a series and the transaction it joined.
pub(crate) type SharedCache = Arc<Mutex<WriteCache>>;

pub(crate) fn lock(cache: &SharedCache) -> MutexGuard<'_, WriteCache> {
    // A poisoned cache still holds consistent buffered values.
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct PendingSeries {
    key: SeriesKey,
    cache: SharedCache,
}

struct SessionInner {
    host: Arc<dyn ScriptHost>,
    transaction: Mutex<Option<Vec<PendingSeries>>>,
}

/// Handle to an engine, cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Session {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                host,
                transaction: Mutex::new(None),
            }),
        }
    }

    fn transaction(&self) -> MutexGuard<'_, Option<Vec<PendingSeries>>> {
        self.inner
            .transaction
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a transaction. Opening one while another is open keeps the
    /// existing one.
    pub fn begin(&self) {
        self.transaction().get_or_insert_with(Vec::new);
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction().is_some()
    }

    /// Whether `self` and `other` share the same state.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Flushes every series written during the transaction in one atomic
    /// batch and closes the transaction.
    ///
    /// On failure nothing is applied, the transaction stays open and every
    /// cache gets its buffered writes back.
    pub async fn commit(&self) -> Result<()> {
        let pending = self
            .transaction()
            .take()
            .ok_or_else(|| Error::SessionNotAvailable("no open transaction to commit".into()))?;

        let taken: Vec<WriteCache> = pending.iter().map(|p| lock(&p.cache).take()).collect();
        let calls = match collect_calls(&pending, &taken) {
            Ok(calls) => calls,
            Err(e) => {
                self.restore(pending, taken);
                return Err(e);
            }
        };
        if calls.is_empty() {
            return Ok(());
        }

        let count = calls.len();
        match self.inner.host.execute_batch(calls).await {
            Ok(_) => {
                tracing::debug!(series = pending.len(), calls = count, "committed transaction");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(series = pending.len(), error = %e, "transaction commit failed");
                self.restore(pending, taken);
                Err(e)
            }
        }
    }

    /// Discards the buffered writes of every series in the transaction and
    /// closes it. Nothing is sent to the engine.
    pub fn rollback(&self) {
        if let Some(pending) = self.transaction().take() {
            for series in &pending {
                lock(&series.cache).clear();
            }
        }
    }

    fn restore(&self, mut pending: Vec<PendingSeries>, taken: Vec<WriteCache>) {
        for (series, writes) in pending.iter().zip(taken) {
            lock(&series.cache).restore(writes);
        }
        let mut transaction = self.transaction();
        if let Some(joined) = transaction.take() {
            for series in joined {
                if !pending.iter().any(|p| Arc::ptr_eq(&p.cache, &series.cache)) {
                    pending.push(series);
                }
            }
        }
        *transaction = Some(pending);
    }

    /// Adds `cache` to the open transaction. Returns `false` when no
    /// transaction is open.
    pub(crate) fn join(&self, key: &SeriesKey, cache: &SharedCache) -> bool {
        let mut transaction = self.transaction();
        let Some(pending) = transaction.as_mut() else {
            return false;
        };
        if !pending.iter().any(|p| Arc::ptr_eq(&p.cache, cache)) {
            pending.push(PendingSeries {
                key: key.clone(),
                cache: cache.clone(),
            });
        }
        true
    }

    /// Flushes the writes buffered in one cache on its own. Writes buffered
    /// while the flush is in flight stay in the cache.
    pub(crate) async fn flush(&self, key: &SeriesKey, cache: &SharedCache) -> Result<()> {
        let taken = lock(cache).take();
        let calls = match taken.to_calls(key) {
            Ok(calls) if calls.is_empty() => return Ok(()),
            Ok(calls) => calls,
            Err(e) => {
                lock(cache).restore(taken);
                return Err(e);
            }
        };
        if let Err(e) = self.inner.host.execute_batch(calls).await {
            lock(cache).restore(taken);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) async fn execute(&self, call: ScriptCall) -> Result<ScriptResponse> {
        self.inner.host.execute(call).await
    }
}

fn collect_calls(pending: &[PendingSeries], taken: &[WriteCache]) -> Result<Vec<ScriptCall>> {
    let mut calls = Vec::new();
    for (series, writes) in pending.iter().zip(taken) {
        calls.extend(writes.to_calls(&series.key)?);
    }
    Ok(calls)
}
