//! Atomic execution of series procedures.
//!
//! The engine is the only component that reads or writes series keys. Every
//! procedure runs under a single writer lock against a staging overlay,
//! and the writes of a whole batch of calls reach storage as one atomic
//! [`Storage::apply_with_options`] call. A failing call discards the whole
//! batch, so readers never observe an index and its fields out of step.
//!
//! Callers talk to the engine through the [`ScriptHost`] trait with
//! wire-encoded arguments, the same way a client would drive procedures
//! registered inside a remote store.

mod insert;
mod merge;
mod range;
mod staging;
mod state;
mod stats;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{Storage, WriteOptions};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{MultiStats, SeriesInfo, SeriesRange, SeriesStats};
use crate::serde::args::{FieldFilter, InsertBatch, MergeDescriptor, Window};
use crate::serde::key::SeriesKey;

use staging::Staging;
use state::SeriesState;

/// Procedures the engine can run against a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    InsertUpdate,
    Merge,
    MergedSeries,
    Stats,
    IStats,
    MultiStats,
    IMultiStats,
    Range,
    IRange,
    Info,
    Delete,
}

impl Procedure {
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::InsertUpdate => "insert_update",
            Procedure::Merge => "merge",
            Procedure::MergedSeries => "merged_series",
            Procedure::Stats => "stats",
            Procedure::IStats => "istats",
            Procedure::MultiStats => "multi_stats",
            Procedure::IMultiStats => "imulti_stats",
            Procedure::Range => "range",
            Procedure::IRange => "irange",
            Procedure::Info => "info",
            Procedure::Delete => "delete",
        }
    }
}

/// One procedure invocation against the series `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    pub procedure: Procedure,
    pub key: String,
    pub args: Vec<Bytes>,
}

impl ScriptCall {
    pub fn new(procedure: Procedure, key: impl Into<String>, args: Vec<Bytes>) -> Self {
        Self {
            procedure,
            key: key.into(),
            args,
        }
    }
}

/// Result of one [`ScriptCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptResponse {
    /// A mutation completed.
    Done,
    Range(SeriesRange),
    /// `None` when the window holds no timestamp.
    Stats(Option<SeriesStats>),
    MultiStats(Option<MultiStats>),
    Info(SeriesInfo),
}

/// Executes procedure calls atomically.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Runs `calls` in order as one atomic unit. Either every call succeeds
    /// and all writes are applied, or nothing is applied.
    async fn execute_batch(&self, calls: Vec<ScriptCall>) -> Result<Vec<ScriptResponse>>;

    async fn execute(&self, call: ScriptCall) -> Result<ScriptResponse> {
        let procedure = call.procedure;
        self.execute_batch(vec![call]).await?.pop().ok_or_else(|| {
            Error::RemoteExecution(format!("{} returned no response", procedure.name()))
        })
    }
}

/// In-process engine running procedures against a [`Storage`].
pub struct Engine {
    storage: Arc<dyn Storage>,
    lock: Mutex<()>,
    write_options: WriteOptions,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>, write_options: WriteOptions) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
            write_options,
        }
    }

    async fn dispatch(&self, staging: &mut Staging<'_>, call: &ScriptCall) -> Result<ScriptResponse> {
        let key = SeriesKey::new(call.key.as_str());
        match call.procedure {
            Procedure::InsertUpdate => {
                let [batch] = args::<1>(call)?;
                let batch = InsertBatch::deserialize(batch)?;
                upsert(staging, key, &batch).await?;
                Ok(ScriptResponse::Done)
            }
            Procedure::Merge => {
                let [descriptor, fields] = args::<2>(call)?;
                let descriptor = MergeDescriptor::deserialize(descriptor)?;
                let filter = FieldFilter::deserialize(fields)?;
                let inputs = merge::load_inputs(staging, &descriptor).await?;
                let merged = merge::combine(&inputs, &filter);
                upsert(staging, key, &merge::to_insert_batch(&merged)).await?;
                Ok(ScriptResponse::Done)
            }
            Procedure::MergedSeries => {
                let [descriptor, fields] = args::<2>(call)?;
                let descriptor = MergeDescriptor::deserialize(descriptor)?;
                let filter = FieldFilter::deserialize(fields)?;
                let inputs = merge::load_inputs(staging, &descriptor).await?;
                Ok(ScriptResponse::Range(merge::combine(&inputs, &filter)))
            }
            Procedure::Stats | Procedure::IStats => {
                let (series, span) = load_window(staging, key, call).await?;
                let stats = span.and_then(|(a, b)| stats::series_stats(&series, a, b));
                Ok(ScriptResponse::Stats(stats))
            }
            Procedure::MultiStats | Procedure::IMultiStats => {
                let (series, span) = load_window(staging, key, call).await?;
                let stats = span.and_then(|(a, b)| stats::multi_stats(&series, a, b));
                Ok(ScriptResponse::MultiStats(stats))
            }
            Procedure::Range | Procedure::IRange => {
                let (series, span) = load_window(staging, key, call).await?;
                Ok(ScriptResponse::Range(range::read(&series, span)))
            }
            Procedure::Info => {
                let [] = args::<0>(call)?;
                let series = SeriesState::load_all(staging, key).await?;
                Ok(ScriptResponse::Info(range::info(&series)))
            }
            Procedure::Delete => {
                let [] = args::<0>(call)?;
                let series = SeriesState::load_all(staging, key).await?;
                if series.exists() {
                    series.remove(staging);
                }
                Ok(ScriptResponse::Done)
            }
        }
    }
}

/// Applies `batch` to the series at `key`. A series that did not exist and
/// gains no timestamp leaves no keys behind.
async fn upsert(staging: &mut Staging<'_>, key: SeriesKey, batch: &InsertBatch) -> Result<()> {
    let mut series = SeriesState::load_all(staging, key).await?;
    let existed = series.exists();
    insert::apply(&mut series, batch)?;
    if existed || !series.index.is_empty() {
        series.store(staging)?;
    }
    Ok(())
}

/// Splits the arguments of `call` into exactly `N` byte strings.
fn args<const N: usize>(call: &ScriptCall) -> Result<[&[u8]; N]> {
    let args: &[Bytes; N] = call.args.as_slice().try_into().map_err(|_| {
        Error::InvalidType(format!(
            "{} takes {} arguments, got {}",
            call.procedure.name(),
            N,
            call.args.len()
        ))
    })?;
    Ok(args.each_ref().map(|arg| arg.as_ref()))
}

/// Loads the selected fields of a series and resolves the call's window to a
/// rank span. Rank procedures take ranks, the others inclusive timestamps.
async fn load_window(
    staging: &Staging<'_>,
    key: SeriesKey,
    call: &ScriptCall,
) -> Result<(SeriesState, Option<(usize, usize)>)> {
    let [window, fields] = args::<2>(call)?;
    let window = Window::deserialize(window)?;
    let filter = FieldFilter::deserialize(fields)?;
    let series = SeriesState::load(staging, key, &filter).await?;
    let span = match call.procedure {
        Procedure::IStats | Procedure::IMultiStats | Procedure::IRange => {
            series.index.resolve(window.start, window.end)
        }
        _ => series.index.rank_span(window.start, window.end),
    };
    Ok((series, span))
}

#[async_trait]
impl ScriptHost for Engine {
    #[tracing::instrument(level = "trace", skip_all, fields(calls = calls.len()))]
    async fn execute_batch(&self, calls: Vec<ScriptCall>) -> Result<Vec<ScriptResponse>> {
        let _guard = self.lock.lock().await;
        let mut staging = Staging::new(self.storage.as_ref());
        let mut responses = Vec::with_capacity(calls.len());
        for call in &calls {
            tracing::debug!(
                procedure = call.procedure.name(),
                key = %call.key,
                "executing procedure"
            );
            let response = self.dispatch(&mut staging, call).await.inspect_err(|e| {
                tracing::debug!(procedure = call.procedure.name(), key = %call.key, error = %e, "procedure failed");
            })?;
            responses.push(response);
        }

        let ops = staging.into_ops();
        if !ops.is_empty() {
            self.storage
                .apply_with_options(ops, self.write_options.clone())
                .await
                .map_err(|e| Error::RemoteExecution(e.to_string()))?;
        }
        Ok(responses)
    }
}
