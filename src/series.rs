//! Grouping of parsed records into plotted series.
//!
//! Ordering is part of the contract: groups appear in the order their first
//! record was seen and points keep input order. Nothing here sorts by `x`;
//! callers that want monotonic lines call [`Series::sort_by_x`] themselves.

use indexmap::IndexMap;
use tracing::debug;

use crate::{error::PlotError, record::MeasurementRecord, stats};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub error_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub series_id: String,
    pub points: Vec<Point>,
}

impl Series {
    fn new(series_id: &str) -> Series {
        Series {
            series_id: series_id.to_owned(),
            points: Vec::new(),
        }
    }

    /// Stable sort of the points by `x`; duplicates keep their input order.
    pub fn sort_by_x(&mut self) {
        self.points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
}

/// How records are bucketed into series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One series per implementation; used by line charts.
    SeriesId,
    /// Every record is its own group; used by bar charts.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Series(String),
    Row(usize),
}

impl Grouping {
    fn key(self, index: usize, record: &MeasurementRecord) -> GroupKey {
        match self {
            Grouping::SeriesId => GroupKey::Series(record.series_id.clone()),
            Grouping::Identity => GroupKey::Row(index),
        }
    }
}

/// Which record statistic becomes the plotted `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Mean,
    SampleMean,
}

impl Measure {
    fn of(self, record: &MeasurementRecord) -> f64 {
        match self {
            Measure::Mean => record.mean,
            Measure::SampleMean => record.sample_mean,
        }
    }
}

pub fn point(record: &MeasurementRecord, measure: Measure) -> Result<Point, PlotError> {
    Ok(Point {
        x: record.input_length as f64,
        y: measure.of(record),
        error_margin: stats::error_margin(record.sample_stddev, record.sample_size)?,
    })
}

/// Groups records into series, appending new groups in first-seen order and
/// points in input order. Rows sharing a key and `x` all stay as points.
pub fn aggregate<'a, I>(
    records: I,
    grouping: Grouping,
    measure: Measure,
) -> Result<IndexMap<GroupKey, Series>, PlotError>
where
    I: IntoIterator<Item = &'a MeasurementRecord>,
{
    let mut groups: IndexMap<GroupKey, Series> = IndexMap::new();
    for (index, record) in records.into_iter().enumerate() {
        let point = point(record, measure)?;
        groups
            .entry(grouping.key(index, record))
            .or_insert_with(|| Series::new(&record.series_id))
            .points
            .push(point);
    }
    debug!(groups = groups.len(), ?grouping, "aggregated series");
    Ok(groups)
}

/// Records measured at `length`, last input row first.
pub fn admit_length(records: &[MeasurementRecord], length: u64) -> Vec<&MeasurementRecord> {
    let admitted: Vec<_> = records
        .iter()
        .rev()
        .filter(|record| record.input_length == length)
        .collect();
    debug!(
        admitted = admitted.len(),
        excluded = records.len() - admitted.len(),
        length,
        "filtered rows by input length"
    );
    admitted
}
