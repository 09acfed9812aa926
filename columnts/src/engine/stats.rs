//! Single-pass statistics over a rank window.

use crate::model::{FieldStats, MultiStats, SeriesStats, StatsType};

use super::state::SeriesState;

#[derive(Default)]
struct Accumulator {
    n: usize,
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    sum2: f64,
    dsum: f64,
    dsum2: f64,
    prev: Option<f64>,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.n += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.sum += value;
        self.sum2 += value * value;
        if let Some(prev) = self.prev {
            let delta = value - prev;
            self.dsum += delta;
            self.dsum2 += delta * delta;
        }
        self.prev = Some(value);
    }

    fn finish(self) -> FieldStats {
        let mean = |total: f64, count: usize| {
            if count == 0 {
                f64::NAN
            } else {
                total / count as f64
            }
        };
        let diffs = self.n.saturating_sub(1);
        FieldStats {
            n: self.n,
            min: self.min.unwrap_or(f64::NAN),
            max: self.max.unwrap_or(f64::NAN),
            sum: mean(self.sum, self.n),
            sum2: mean(self.sum2, self.n),
            dsum: mean(self.dsum, diffs),
            dsum2: mean(self.dsum2, diffs),
        }
    }
}

pub(crate) fn field_stats(values: impl IntoIterator<Item = f64>) -> FieldStats {
    let mut acc = Accumulator::default();
    for value in values {
        acc.push(value);
    }
    acc.finish()
}

/// Statistics of every loaded field over ranks `[start, end]`.
pub(crate) fn series_stats(series: &SeriesState, start: usize, end: usize) -> Option<SeriesStats> {
    let first = series.index.get(start)?;
    let last = series.index.get(end)?;
    let stats = series
        .columns
        .iter()
        .map(|(name, column)| (name.clone(), field_stats(column.read_range(start, end))))
        .collect();
    Some(SeriesStats {
        start: first,
        stop: last,
        len: end - start + 1,
        stats,
    })
}

/// Counts the ranks in `[start, end]` at which every loaded field has a value.
pub(crate) fn multi_stats(series: &SeriesState, start: usize, end: usize) -> Option<MultiStats> {
    let first = series.index.get(start)?;
    let last = series.index.get(end)?;
    let n = (start..=end)
        .filter(|rank| {
            !series.columns.is_empty()
                && series.columns.values().all(|c| !c.value(*rank).is_nan())
        })
        .count();
    Some(MultiStats {
        stats_type: StatsType::Multi,
        start: first,
        stop: last,
        n,
        fields: series.columns.keys().cloned().collect(),
    })
}
