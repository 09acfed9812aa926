//! The series façade.
//!
//! A [`ColumnTs`] names one multi-field series. Writes are buffered in its
//! write cache and flushed through its [`Session`]; reads always go to the
//! engine and see committed state only, never the series' own buffered
//! writes.

use std::sync::{Arc, Mutex};

use crate::cache::{PendingMerge, WriteCache};
use crate::engine::{Procedure, ScriptCall, ScriptResponse};
use crate::error::{Error, Result};
use crate::model::{FieldValues, MultiStats, SeriesInfo, SeriesRange, SeriesStats, Timestamp};
use crate::serde::args::{FieldFilter, MergeDescriptor, MergeTerm, Window};
use crate::serde::key::SeriesKey;
use crate::session::{Session, SharedCache, lock};

/// Where a series stands relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Not attached to a session and nothing buffered. Reads fail.
    Detached,
    /// Buffered writes not yet committed, attached or not.
    Pending,
    /// Attached, with nothing buffered.
    Committed,
}

/// One weighted term of a merge: `weight × series`, optionally scaled by the
/// first field of a multiplier series.
#[derive(Debug, Clone)]
pub struct MergeComponent {
    weight: f64,
    series: String,
    multiplier: Option<String>,
    session: Option<Session>,
}

impl MergeComponent {
    pub fn new(weight: f64, series: &ColumnTs) -> Self {
        Self {
            weight,
            series: series.id().to_string(),
            multiplier: None,
            session: series.session.clone(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: &ColumnTs) -> Self {
        self.multiplier = Some(multiplier.id().to_string());
        self
    }

    fn term(&self) -> MergeTerm {
        MergeTerm {
            weight: self.weight,
            series: self.series.clone(),
            multiplier: self.multiplier.clone(),
        }
    }
}

fn descriptor(components: &[MergeComponent]) -> Result<MergeDescriptor> {
    let descriptor = MergeDescriptor {
        terms: components.iter().map(MergeComponent::term).collect(),
    };
    descriptor.validate()?;
    Ok(descriptor)
}

fn component_session(components: &[MergeComponent]) -> Option<Session> {
    components.iter().find_map(|c| c.session.clone())
}

/// A columnar time series.
///
/// # Example
///
/// ```ignore
/// let session = db.session();
/// let series = db.series("EUR:USD");
/// session.begin();
/// series.add_fields(1_327_276_800, [("open", 1.31), ("close", 1.30)]).await?;
/// session.commit().await?;
/// assert_eq!(series.size().await?, 1);
/// ```
#[derive(Debug)]
pub struct ColumnTs {
    key: SeriesKey,
    cache: SharedCache,
    session: Option<Session>,
}

impl ColumnTs {
    /// A series not attached to any session.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            key: SeriesKey::new(id),
            cache: Arc::new(Mutex::new(WriteCache::new())),
            session: None,
        }
    }

    pub fn with_session(id: impl Into<String>, session: Session) -> Self {
        let mut series = Self::new(id);
        series.session = Some(session);
        series
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Attaches the series to `session`. Writes buffered while detached are
    /// flushed with the next commit (or right away, with no open transaction).
    pub async fn attach(&mut self, session: Session) -> Result<()> {
        self.session = Some(session);
        if !lock(&self.cache).is_empty() {
            self.after_write().await?;
        }
        Ok(())
    }

    pub fn status(&self) -> SeriesStatus {
        if !lock(&self.cache).is_empty() {
            return SeriesStatus::Pending;
        }
        match &self.session {
            None => SeriesStatus::Detached,
            Some(_) => SeriesStatus::Committed,
        }
    }

    /// Number of buffered, uncommitted values of `field`.
    pub fn pending_values(&self, field: &str) -> usize {
        lock(&self.cache).pending_values(field)
    }

    /// Sets `field` at `timestamp`. NaN stores a nil value. Field names may
    /// not contain ':'.
    pub async fn add(&self, timestamp: Timestamp, field: &str, value: f64) -> Result<()> {
        lock(&self.cache).add(timestamp, field, value)?;
        self.after_write().await
    }

    pub async fn add_fields<I, K>(&self, timestamp: Timestamp, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        lock(&self.cache).add_fields(timestamp, values)?;
        self.after_write().await
    }

    /// Sets every value of `rows`, one row of fields per timestamp.
    pub async fn update<I>(&self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = (Timestamp, FieldValues)>,
    {
        lock(&self.cache).add_rows(rows)?;
        self.after_write().await
    }

    /// Sets a single value. Same as [`ColumnTs::add`].
    pub async fn set(&self, timestamp: Timestamp, field: &str, value: f64) -> Result<()> {
        self.add(timestamp, field, value).await
    }

    /// Replaces the contents of every field at the union of the components'
    /// timestamps with their weighted sum.
    ///
    /// A detached series adopts the session of its first attached component.
    pub async fn merge(&mut self, components: &[MergeComponent]) -> Result<()> {
        self.merge_fields(components, FieldFilter::all()).await
    }

    /// Like [`ColumnTs::merge`], restricted to the fields in `fields`.
    pub async fn merge_fields(
        &mut self,
        components: &[MergeComponent],
        fields: FieldFilter,
    ) -> Result<()> {
        let descriptor = descriptor(components)?;
        if self.session.is_none() {
            self.session = Some(component_session(components).ok_or_else(|| {
                Error::SessionNotAvailable(format!(
                    "cannot merge into '{}': neither it nor any component has a session",
                    self.id()
                ))
            })?);
        }
        lock(&self.cache).set_merge(PendingMerge { descriptor, fields });
        self.after_write().await
    }

    /// Computes a merge without storing it.
    pub async fn merged_series(
        components: &[MergeComponent],
        fields: FieldFilter,
    ) -> Result<SeriesRange> {
        let descriptor = descriptor(components)?;
        let session = component_session(components).ok_or_else(|| {
            Error::SessionNotAvailable("no merge component has a session".into())
        })?;
        let key = components
            .first()
            .map(|c| c.series.clone())
            .unwrap_or_default();
        let call = ScriptCall::new(
            Procedure::MergedSeries,
            key,
            vec![descriptor.serialize()?, fields.serialize()?],
        );
        match session.execute(call).await? {
            ScriptResponse::Range(range) => Ok(range),
            other => Err(unexpected(Procedure::MergedSeries, &other)),
        }
    }

    async fn after_write(&self) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        if session.join(&self.key, &self.cache) {
            return Ok(());
        }
        session.flush(&self.key, &self.cache).await
    }

    fn attached(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::ModelNotAvailable(self.id().to_string()))
    }

    async fn call(&self, procedure: Procedure, args: Vec<bytes::Bytes>) -> Result<ScriptResponse> {
        let session = self.attached()?;
        session
            .execute(ScriptCall::new(procedure, self.id(), args))
            .await
    }

    async fn windowed(
        &self,
        procedure: Procedure,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<ScriptResponse> {
        let args = vec![Window::new(start, end).serialize(), fields.serialize()?];
        self.call(procedure, args).await
    }

    async fn read_range(
        &self,
        procedure: Procedure,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<SeriesRange> {
        match self.windowed(procedure, start, end, fields).await? {
            ScriptResponse::Range(range) => Ok(range),
            other => Err(unexpected(procedure, &other)),
        }
    }

    async fn read_stats(
        &self,
        procedure: Procedure,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<Option<SeriesStats>> {
        match self.windowed(procedure, start, end, fields).await? {
            ScriptResponse::Stats(stats) => Ok(stats),
            other => Err(unexpected(procedure, &other)),
        }
    }

    async fn read_multi_stats(
        &self,
        procedure: Procedure,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<Option<MultiStats>> {
        match self.windowed(procedure, start, end, fields).await? {
            ScriptResponse::MultiStats(stats) => Ok(stats),
            other => Err(unexpected(procedure, &other)),
        }
    }

    /// Values of ranks `[start, end]`. Negative ranks count from the end.
    pub async fn irange(&self, start: i64, end: i64, fields: &FieldFilter) -> Result<SeriesRange> {
        self.read_range(Procedure::IRange, start, end, fields).await
    }

    /// Values at timestamps within `[start, end]`, both inclusive.
    pub async fn range(
        &self,
        start: Timestamp,
        end: Timestamp,
        fields: &FieldFilter,
    ) -> Result<SeriesRange> {
        self.read_range(Procedure::Range, start, end, fields).await
    }

    /// Per-field statistics over timestamps `[start, end]`. `None` when the
    /// window holds no timestamp.
    pub async fn stats(
        &self,
        start: Timestamp,
        end: Timestamp,
        fields: &FieldFilter,
    ) -> Result<Option<SeriesStats>> {
        self.read_stats(Procedure::Stats, start, end, fields).await
    }

    pub async fn istats(
        &self,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<Option<SeriesStats>> {
        self.read_stats(Procedure::IStats, start, end, fields).await
    }

    pub async fn multi_stats(
        &self,
        start: Timestamp,
        end: Timestamp,
        fields: &FieldFilter,
    ) -> Result<Option<MultiStats>> {
        self.read_multi_stats(Procedure::MultiStats, start, end, fields)
            .await
    }

    pub async fn imulti_stats(
        &self,
        start: i64,
        end: i64,
        fields: &FieldFilter,
    ) -> Result<Option<MultiStats>> {
        self.read_multi_stats(Procedure::IMultiStats, start, end, fields)
            .await
    }

    /// Size, bounds and field lengths in one call.
    pub async fn info(&self) -> Result<SeriesInfo> {
        match self.call(Procedure::Info, Vec::new()).await? {
            ScriptResponse::Info(info) => Ok(info),
            other => Err(unexpected(Procedure::Info, &other)),
        }
    }

    /// Number of timestamps.
    pub async fn size(&self) -> Result<usize> {
        Ok(self.info().await?.size)
    }

    pub async fn numfields(&self) -> Result<usize> {
        Ok(self.info().await?.fields.len())
    }

    /// Field names in name order.
    pub async fn fields(&self) -> Result<Vec<String>> {
        Ok(self.info().await?.fields.into_keys().collect())
    }

    pub async fn front(&self) -> Result<Option<Timestamp>> {
        Ok(self.info().await?.front)
    }

    pub async fn back(&self) -> Result<Option<Timestamp>> {
        Ok(self.info().await?.back)
    }

    /// The first stored timestamp with its values.
    pub async fn front_row(&self) -> Result<Option<(Timestamp, FieldValues)>> {
        Ok(self.irange(0, 0, &FieldFilter::all()).await?.row(0))
    }

    pub async fn back_row(&self) -> Result<Option<(Timestamp, FieldValues)>> {
        Ok(self.irange(-1, -1, &FieldFilter::all()).await?.row(0))
    }

    /// Every timestamp, in order.
    pub async fn timestamps(&self) -> Result<Vec<Timestamp>> {
        Ok(self.irange(0, -1, &FieldFilter::all()).await?.timestamps)
    }

    /// Values of every field at `timestamp`, or `None` if it is not stored.
    pub async fn get(&self, timestamp: Timestamp) -> Result<Option<FieldValues>> {
        let range = self.range(timestamp, timestamp, &FieldFilter::all()).await?;
        Ok(range.row(0).map(|(_, values)| values))
    }

    /// Like [`ColumnTs::get`], failing when `timestamp` is not stored.
    pub async fn item(&self, timestamp: Timestamp) -> Result<FieldValues> {
        self.get(timestamp)
            .await?
            .ok_or(Error::TimestampNotFound(timestamp))
    }

    /// Removes the series from the store right away.
    pub async fn delete(&self) -> Result<()> {
        self.call(Procedure::Delete, Vec::new()).await?;
        Ok(())
    }
}

fn unexpected(procedure: Procedure, response: &ScriptResponse) -> Error {
    Error::RemoteExecution(format!(
        "{} returned an unexpected response: {:?}",
        procedure.name(),
        response
    ))
}
