//! Configuration for opening a [`ColumnTsDb`](crate::ColumnTsDb).

use std::path::Path;

use common::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for opening a [`ColumnTsDb`](crate::ColumnTsDb).
///
/// # Example
///
/// ```yaml
/// storage:
///   type: SlateDb
///   path: columnts
///   object_store:
///     type: Local
///     path: /var/lib/columnts
/// engine:
///   await_durable: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage backend the engine writes to.
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Options of the atomic mutation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wait for each committed batch to be durable before returning.
    ///
    /// When `false` (the default), a commit returns once the batch is applied
    /// to the backend's memtable.
    #[serde(default)]
    pub await_durable: bool,
}

impl Config {
    /// Loads a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }
}
