use std::{io, str::FromStr};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::PlotError;

/// One tabular input row: column name to raw cell text.
pub type Row = IndexMap<String, String>;

/// Aggregate timing statistics for one (implementation, input length) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub series_id: String,
    pub input_length: u64,
    pub mean: f64,
    pub stddev: f64,
    pub sample_mean: f64,
    pub sample_stddev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Number of trials behind `sample_mean` and `sample_stddev`, always >= 1.
    pub sample_size: u64,
}

impl MeasurementRecord {
    /// Builds a record from a row. `row_no` is only used in error messages.
    pub fn from_row(row_no: usize, row: &Row) -> Result<MeasurementRecord, PlotError> {
        let sample_size = parse_field::<i64>(row_no, row, "num_samples")?;
        if sample_size < 1 {
            return Err(PlotError::DegenerateSample(sample_size));
        }

        Ok(MeasurementRecord {
            series_id: field(row_no, row, "name")?.to_owned(),
            input_length: parse_field(row_no, row, "length")?,
            mean: real(row_no, row, "mean")?,
            stddev: non_negative(row_no, row, "stddev")?,
            sample_mean: real(row_no, row, "sample_mean")?,
            sample_stddev: non_negative(row_no, row, "sample_stddev")?,
            median: real(row_no, row, "median")?,
            min: real(row_no, row, "min")?,
            max: real(row_no, row, "max")?,
            sample_size: sample_size as u64,
        })
    }
}

fn field<'a>(row_no: usize, row: &'a Row, name: &str) -> Result<&'a str, PlotError> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| PlotError::malformed(row_no, format!("missing field `{}`", name)))
}

fn parse_field<T>(row_no: usize, row: &Row, name: &str) -> Result<T, PlotError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = field(row_no, row, name)?;
    raw.trim().parse::<T>().map_err(|e| {
        PlotError::malformed(row_no, format!("field `{}` = {:?}: {}", name, raw, e))
    })
}

fn real(row_no: usize, row: &Row, name: &str) -> Result<f64, PlotError> {
    let value = parse_field::<f64>(row_no, row, name)?;
    if !value.is_finite() {
        return Err(PlotError::malformed(
            row_no,
            format!("field `{}` is not a finite number", name),
        ));
    }
    Ok(value)
}

fn non_negative(row_no: usize, row: &Row, name: &str) -> Result<f64, PlotError> {
    let value = real(row_no, row, name)?;
    if value < 0. {
        return Err(PlotError::malformed(
            row_no,
            format!("field `{}` must not be negative, got {}", name, value),
        ));
    }
    Ok(value)
}

/// Reads every row of a headed CSV stream into records, in input order.
///
/// Stops at the first bad row; rows are numbered from 1, header excluded.
pub fn read_records<R: io::Read>(input: R) -> Result<Vec<MeasurementRecord>, PlotError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<Row>().enumerate() {
        let row_no = i + 1;
        let row = row.map_err(|e| PlotError::malformed(row_no, e.to_string()))?;
        records.push(MeasurementRecord::from_row(row_no, &row)?);
    }
    debug!(records = records.len(), "parsed aggregate rows");
    Ok(records)
}
