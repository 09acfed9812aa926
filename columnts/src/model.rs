//! Result types returned by series reads.

use std::collections::BTreeMap;

/// Seconds (or finer) since the UNIX epoch.
pub type Timestamp = i64;

/// Values of every field at one timestamp. Missing values are NaN.
pub type FieldValues = BTreeMap<String, f64>;

/// Timestamps of a window and the values of each selected field, aligned by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesRange {
    pub timestamps: Vec<Timestamp>,
    pub fields: BTreeMap<String, Vec<f64>>,
}

impl SeriesRange {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Values of every field at position `i`.
    pub fn row(&self, i: usize) -> Option<(Timestamp, FieldValues)> {
        let timestamp = *self.timestamps.get(i)?;
        let values = self
            .fields
            .iter()
            .map(|(name, values)| (name.clone(), values.get(i).copied().unwrap_or(f64::NAN)))
            .collect();
        Some((timestamp, values))
    }
}

/// Single-pass statistics of one field over a window.
///
/// Only non-nil values are counted. `sum` and `sum2` are the mean value and
/// mean squared value over `n`; `dsum` and `dsum2` are the mean and mean
/// squared first difference over the `n - 1` differences between consecutive
/// non-nil values. Means with no samples are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sum2: f64,
    pub dsum: f64,
    pub dsum2: f64,
}

impl FieldStats {
    /// Sample variance reconstructed from the moments.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            return f64::NAN;
        }
        let n = self.n as f64;
        (self.sum2 - self.sum * self.sum) * n / (n - 1.0)
    }
}

/// Per-field statistics over a window of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub start: Timestamp,
    pub stop: Timestamp,
    pub len: usize,
    pub stats: BTreeMap<String, FieldStats>,
}

/// Kind marker of a multivariate statistics result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsType {
    Multi,
}

/// Envelope of a multivariate statistics pass.
///
/// `n` counts the ranks at which every selected field has a value.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiStats {
    pub stats_type: StatsType,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub n: usize,
    pub fields: Vec<String>,
}

/// Layout of one series, gathered in a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesInfo {
    pub size: usize,
    pub front: Option<Timestamp>,
    pub back: Option<Timestamp>,
    /// Byte length of each field string.
    pub fields: BTreeMap<String, usize>,
}
