//! Raw benchmark timings to per-case summary rows.
//!
//! The output columns are exactly the ones the chart commands read, so
//! `benchplot agg < results.csv | benchplot bar` works as a pipeline.

use std::{collections::BTreeMap, io};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::PlotError, record::MeasurementRecord, stats::Stats};

/// Only timings from unattended runs are summarized; seeding and
/// user-triggered runs are dropped.
pub const ADMITTED_SOURCE: &str = "auto";

#[derive(Debug, Deserialize)]
struct Timing {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Test")]
    test: String,
    #[serde(rename = "Length")]
    length: u64,
    #[serde(rename = "Time")]
    time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub name: String,
    pub length: u64,
    pub mean: f64,
    pub stddev: f64,
    pub sample_mean: f64,
    pub sample_stddev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub num_samples: usize,
}

/// Rounds to three decimals. Magnitudes too large to scale have no
/// fractional part left and pass through unchanged.
fn round3(value: f64) -> f64 {
    if value.abs() > f64::MAX / 1000. {
        return value;
    }
    (value * 1000.).round() / 1000.
}

impl AggregateRow {
    fn new(name: String, length: u64, stats: &Stats) -> AggregateRow {
        AggregateRow {
            name,
            length,
            mean: round3(stats.mean),
            stddev: round3(stats.std_dev),
            sample_mean: round3(stats.mean),
            sample_stddev: round3(stats.sample_std_dev),
            median: round3(stats.median),
            min: round3(stats.min),
            max: round3(stats.max),
            num_samples: stats.size,
        }
    }
}

impl From<&AggregateRow> for MeasurementRecord {
    fn from(row: &AggregateRow) -> MeasurementRecord {
        MeasurementRecord {
            series_id: row.name.clone(),
            input_length: row.length,
            mean: row.mean,
            stddev: row.stddev,
            sample_mean: row.sample_mean,
            sample_stddev: row.sample_stddev,
            median: row.median,
            min: row.min,
            max: row.max,
            sample_size: row.num_samples as u64,
        }
    }
}

/// Summarizes raw `Source,Test,Length,Time` rows per (test, length), sorted
/// by test name and then length.
pub fn aggregate_timings<R: io::Read>(input: R) -> Result<Vec<AggregateRow>, PlotError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut sets: BTreeMap<(String, u64), Vec<f64>> = BTreeMap::new();
    let mut skipped = 0;

    for (i, timing) in reader.deserialize::<Timing>().enumerate() {
        let row_no = i + 1;
        let timing = timing.map_err(|e| PlotError::malformed(row_no, e.to_string()))?;
        if !timing.time.is_finite() {
            return Err(PlotError::malformed(row_no, "field `Time` is not a finite number"));
        }
        if timing.source != ADMITTED_SOURCE {
            skipped += 1;
            continue;
        }
        sets.entry((timing.test, timing.length))
            .or_default()
            .push(timing.time);
    }
    debug!(sets = sets.len(), skipped, "grouped raw timings");

    Ok(sets
        .into_iter()
        .filter_map(|((name, length), times)| {
            Stats::compute(&times).map(|stats| AggregateRow::new(name, length, &stats))
        })
        .collect())
}

pub fn write_rows<W: io::Write>(rows: &[AggregateRow], out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::read_records;

    const RAW: &str = "Source,Test,Length,Time\n\
        auto,h1,100,3\n\
        auto,h0,1000,10\n\
        seed,h0,100,999\n\
        auto,h0,100,1\n\
        auto,h0,100,2\n\
        user,h1,100,999\n\
        auto,h0,100,6\n";

    #[test]
    fn groups_sorts_and_summarizes() {
        let rows = aggregate_timings(RAW.as_bytes()).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| (r.name.as_str(), r.length)).collect();
        assert_eq!(keys, [("h0", 100), ("h0", 1000), ("h1", 100)]);

        let h0 = &rows[0];
        assert_eq!(h0.num_samples, 3);
        assert_eq!(h0.mean, 3.);
        assert_eq!(h0.sample_mean, 3.);
        assert_eq!(h0.median, 2.);
        assert_eq!(h0.min, 1.);
        assert_eq!(h0.max, 6.);
        assert_eq!(h0.stddev, 2.160);
        assert_eq!(h0.sample_stddev, 2.646);
    }

    #[test]
    fn single_sample_has_zero_sample_stddev() {
        let rows = aggregate_timings(RAW.as_bytes()).unwrap();
        assert_eq!(rows[2].num_samples, 1);
        assert_eq!(rows[2].sample_stddev, 0.);
    }

    #[test]
    fn non_auto_rows_are_dropped() {
        let rows = aggregate_timings(RAW.as_bytes()).unwrap();
        assert!(rows.iter().all(|r| r.max < 999.));
    }

    #[test]
    fn malformed_timing_is_fatal() {
        let raw = "Source,Test,Length,Time\nauto,h0,100,1\nauto,h0,ten,1\n";
        assert!(matches!(
            aggregate_timings(raw.as_bytes()),
            Err(PlotError::MalformedRecord { row: 2, .. })
        ));
    }

    #[test]
    fn rounding_keeps_huge_times_finite() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(f64::MAX), f64::MAX);
        assert_eq!(round3(-1e306), -1e306);

        let raw = "Source,Test,Length,Time\nauto,h0,100,1e306\n";
        let rows = aggregate_timings(raw.as_bytes()).unwrap();
        assert_eq!(rows[0].max, 1e306);
        assert!(rows[0].mean.is_finite());
    }

    #[test]
    fn written_rows_parse_as_records() {
        let rows = aggregate_timings(RAW.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_rows(&rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "name,length,mean,stddev,sample_mean,sample_stddev,median,min,max,num_samples\n"
        ));

        let records = read_records(text.as_bytes()).unwrap();
        let converted: Vec<MeasurementRecord> = rows.iter().map(MeasurementRecord::from).collect();
        assert_eq!(records, converted);
    }
}
