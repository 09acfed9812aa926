//! Batched insert-or-update of field values.
//!
//! Every timestamp the batch introduces is found up front, so each one shifts
//! the existing columns exactly once before any value is written.

use crate::codec::NIL_RECORD;
use crate::error::{Error, Result};
use crate::field::FieldColumn;
use crate::serde::args::InsertBatch;

use super::state::SeriesState;

pub(crate) fn apply(series: &mut SeriesState, batch: &InsertBatch) -> Result<()> {
    let mut new_timestamps: Vec<_> = batch
        .entries
        .iter()
        .map(|entry| entry.timestamp)
        .filter(|timestamp| series.index.rank_of(*timestamp).is_none())
        .collect();
    new_timestamps.sort_unstable();
    new_timestamps.dedup();

    for entry in &batch.entries {
        for name in entry.fields.keys() {
            if !series.columns.contains_key(name) {
                series
                    .columns
                    .insert(name.clone(), FieldColumn::nil(series.index.len()));
                series.names.insert(name.clone());
            }
        }
    }

    for timestamp in new_timestamps {
        let (rank, _) = series.index.insert(timestamp);
        for column in series.columns.values_mut() {
            column.insert_at(rank, &NIL_RECORD)?;
        }
    }

    for entry in &batch.entries {
        let rank = series.index.rank_of(entry.timestamp).ok_or_else(|| {
            Error::RemoteExecution(format!("timestamp {} missing after insert", entry.timestamp))
        })?;
        for (name, record) in &entry.fields {
            if let Some(column) = series.columns.get_mut(name) {
                column.overwrite(rank, record)?;
            }
        }
    }
    Ok(())
}
