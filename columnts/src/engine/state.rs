use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::field::FieldColumn;
use crate::index::TimeIndex;
use crate::model::Timestamp;
use crate::serde::FieldSetValue;
use crate::serde::args::FieldFilter;
use crate::serde::key::SeriesKey;

use super::staging::Staging;

/// A series as read through the staging overlay.
///
/// `names` always holds the full field set, while `columns` holds only the
/// fields that were asked for. A state loaded with every field can be stored
/// back.
#[derive(Debug, Clone)]
pub(crate) struct SeriesState {
    pub(crate) key: SeriesKey,
    pub(crate) index: TimeIndex,
    pub(crate) names: BTreeSet<String>,
    pub(crate) columns: BTreeMap<String, FieldColumn>,
}

fn wrong_type(key: &SeriesKey, err: Error) -> Error {
    Error::RemoteExecution(format!(
        "WRONGTYPE series '{}' holds a value of the wrong kind: {}",
        key.id(),
        err
    ))
}

impl SeriesState {
    pub(crate) async fn load(
        staging: &Staging<'_>,
        key: SeriesKey,
        filter: &FieldFilter,
    ) -> Result<Self> {
        let index = match staging.get(&key.time_index()).await? {
            Some(value) => TimeIndex::deserialize(&value).map_err(|e| wrong_type(&key, e))?,
            None => TimeIndex::new(),
        };
        let names = match staging.get(&key.field_set()).await? {
            Some(value) => {
                FieldSetValue::deserialize(&value)
                    .map_err(|e| wrong_type(&key, e))?
                    .fields
            }
            None => BTreeSet::new(),
        };

        let mut columns = BTreeMap::new();
        for name in filter.select(&names) {
            let column = match staging.get(&key.field(&name)).await? {
                Some(value) => FieldColumn::from_bytes(&value).map_err(|e| wrong_type(&key, e))?,
                None => FieldColumn::new(),
            };
            if column.len() != index.len() {
                return Err(Error::RemoteExecution(format!(
                    "field '{}' of series '{}' holds {} records but the index holds {}",
                    name,
                    key.id(),
                    column.len(),
                    index.len()
                )));
            }
            columns.insert(name, column);
        }

        Ok(Self {
            key,
            index,
            names,
            columns,
        })
    }

    pub(crate) async fn load_all(staging: &Staging<'_>, key: SeriesKey) -> Result<Self> {
        Self::load(staging, key, &FieldFilter::all()).await
    }

    /// Stages the index, field set and every column.
    pub(crate) fn store(&self, staging: &mut Staging<'_>) -> Result<()> {
        if self.columns.len() != self.names.len() {
            return Err(Error::RemoteExecution(format!(
                "series '{}' was loaded with {} of {} fields and cannot be stored",
                self.key.id(),
                self.columns.len(),
                self.names.len()
            )));
        }
        staging.put(self.key.time_index(), self.index.serialize());
        let field_set = FieldSetValue {
            fields: self.names.clone(),
        };
        staging.put(self.key.field_set(), field_set.serialize()?);
        for (name, column) in &self.columns {
            staging.put(self.key.field(name), column.to_bytes());
        }
        Ok(())
    }

    /// Stages removal of every key of the series.
    pub(crate) fn remove(&self, staging: &mut Staging<'_>) {
        staging.delete(self.key.time_index());
        staging.delete(self.key.field_set());
        for name in &self.names {
            staging.delete(self.key.field(name));
        }
    }

    pub(crate) fn exists(&self) -> bool {
        !self.index.is_empty() || !self.names.is_empty()
    }

    /// Value of `field` at `timestamp`, NaN when either is absent.
    pub(crate) fn value_at(&self, field: &str, timestamp: Timestamp) -> f64 {
        match (self.columns.get(field), self.index.rank_of(timestamp)) {
            (Some(column), Some(rank)) => column.value(rank),
            _ => f64::NAN,
        }
    }

    /// Value of the first field, in name order, at `timestamp`.
    pub(crate) fn first_field_at(&self, timestamp: Timestamp) -> f64 {
        match self.columns.keys().next() {
            Some(field) => self.value_at(field, timestamp),
            None => f64::NAN,
        }
    }
}
