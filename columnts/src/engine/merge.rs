//! Weighted linear combination of series.
//!
//! The result spans the union of the component timestamps and the union of
//! their field names. At each timestamp a field's value is
//! `Σ weight · multiplier(t) · value(t)`, where a value or multiplier that is
//! absent or nil makes the whole sum nil.

use std::collections::BTreeSet;

use crate::codec::encode_value;
use crate::error::Result;
use crate::index::TimeIndex;
use crate::model::SeriesRange;
use crate::serde::args::{FieldFilter, InsertBatch, InsertEntry, MergeDescriptor};
use crate::serde::key::SeriesKey;

use super::staging::Staging;
use super::state::SeriesState;

pub(crate) struct MergeInput {
    weight: f64,
    series: SeriesState,
    multiplier: Option<SeriesState>,
}

impl MergeInput {
    fn term(&self, field: &str, timestamp: i64) -> f64 {
        let multiplier = match &self.multiplier {
            Some(series) => series.first_field_at(timestamp),
            None => 1.0,
        };
        self.weight * multiplier * self.series.value_at(field, timestamp)
    }
}

pub(crate) async fn load_inputs(
    staging: &Staging<'_>,
    descriptor: &MergeDescriptor,
) -> Result<Vec<MergeInput>> {
    descriptor.validate()?;
    let mut inputs = Vec::with_capacity(descriptor.terms.len());
    for term in &descriptor.terms {
        let series = SeriesState::load_all(staging, SeriesKey::new(term.series.as_str())).await?;
        let multiplier = match &term.multiplier {
            Some(id) => Some(SeriesState::load_all(staging, SeriesKey::new(id.as_str())).await?),
            None => None,
        };
        inputs.push(MergeInput {
            weight: term.weight,
            series,
            multiplier,
        });
    }
    Ok(inputs)
}

pub(crate) fn combine(inputs: &[MergeInput], filter: &FieldFilter) -> SeriesRange {
    let index: TimeIndex = inputs
        .iter()
        .flat_map(|input| input.series.index.as_slice().iter().copied())
        .collect();
    let names: BTreeSet<String> = inputs
        .iter()
        .flat_map(|input| input.series.names.iter().cloned())
        .collect();

    let fields = filter
        .select(&names)
        .into_iter()
        .map(|field| {
            let values: Vec<f64> = index
                .as_slice()
                .iter()
                .map(|t| inputs.iter().map(|input| input.term(&field, *t)).sum::<f64>())
                .collect();
            (field, values)
        })
        .collect();

    SeriesRange {
        timestamps: index.as_slice().to_vec(),
        fields,
    }
}

/// The insert batch writing `range` into a series.
pub(crate) fn to_insert_batch(range: &SeriesRange) -> InsertBatch {
    let entries = (0..range.len())
        .filter_map(|i| range.row(i))
        .map(|(timestamp, values)| InsertEntry {
            timestamp,
            fields: values
                .into_iter()
                .map(|(field, value)| (field, encode_value(value)))
                .collect(),
        })
        .collect();
    InsertBatch { entries }
}
