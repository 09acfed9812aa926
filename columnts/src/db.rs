use std::sync::Arc;

use common::storage::factory::create_storage;
use common::{Storage, StorageIterator, StorageRead, WriteOptions};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::serde::key::SeriesKey;
use crate::series::ColumnTs;
use crate::session::Session;

/// A ColumnTS database: a storage backend and the engine that owns its keys.
///
/// # Example
///
/// ```ignore
/// let db = ColumnTsDb::open(Config::default()).await?;
/// let session = db.session();
/// let series = ColumnTs::with_session("EUR:USD", session.clone());
/// series.add(1_327_276_800, "close", 1.30).await?;
/// db.close().await?;
/// ```
pub struct ColumnTsDb {
    storage: Arc<dyn Storage>,
    engine: Arc<Engine>,
}

impl ColumnTsDb {
    /// Opens the storage backend named by `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let storage = create_storage(&config.storage).await?;
        tracing::info!(storage = ?config.storage, "opened columnts database");
        Ok(Self::with_storage(storage, &config))
    }

    /// Runs on an already open storage backend.
    pub fn with_storage(storage: Arc<dyn Storage>, config: &Config) -> Self {
        let write_options = WriteOptions {
            await_durable: config.engine.await_durable,
        };
        let engine = Arc::new(Engine::new(storage.clone(), write_options));
        Self { storage, engine }
    }

    /// A new session on this database. Sessions do not share transactions.
    pub fn session(&self) -> Session {
        Session::new(self.engine.clone())
    }

    /// The engine, for driving procedures with wire-encoded arguments.
    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// A series attached to a fresh session.
    pub fn series(&self, id: impl Into<String>) -> ColumnTs {
        ColumnTs::with_session(id, self.session())
    }

    /// Ids of every stored series, in key order.
    pub async fn series_ids(&self) -> Result<Vec<String>> {
        let mut iter = self.storage.scan_iter(SeriesKey::all_time_indexes()).await?;
        let mut ids = Vec::new();
        while let Some(record) = iter.next().await? {
            ids.push(SeriesKey::from_time_index(&record.key)?.id().to_string());
        }
        Ok(ids)
    }

    /// Flushes outstanding writes and closes the backend.
    pub async fn close(&self) -> Result<()> {
        self.storage.flush().await?;
        self.storage.close().await?;
        tracing::info!("closed columnts database");
        Ok(())
    }
}
