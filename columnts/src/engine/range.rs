use crate::model::{SeriesInfo, SeriesRange};

use super::state::SeriesState;

/// Timestamps and loaded field values of an inclusive rank span. No span
/// reads as an empty window that still names every loaded field.
pub(crate) fn read(series: &SeriesState, span: Option<(usize, usize)>) -> SeriesRange {
    let Some((start, end)) = span else {
        return SeriesRange {
            timestamps: Vec::new(),
            fields: series
                .columns
                .keys()
                .map(|name| (name.clone(), Vec::new()))
                .collect(),
        };
    };
    SeriesRange {
        timestamps: series.index.as_slice()[start..=end].to_vec(),
        fields: series
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.read_range(start, end)))
            .collect(),
    }
}

pub(crate) fn info(series: &SeriesState) -> SeriesInfo {
    SeriesInfo {
        size: series.index.len(),
        front: series.index.front(),
        back: series.index.back(),
        fields: series
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.byte_len()))
            .collect(),
    }
}
