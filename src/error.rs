use std::path::PathBuf;

use thiserror::Error;

/// Failures of the record-to-chart pipeline. Every variant is fatal: a bad
/// input row invalidates the whole chart, so nothing is rendered.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("malformed record on row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("degenerate sample: sample size must be positive, got {0}")]
    DegenerateSample(i64),

    #[error("unknown series `{0}`: no entry in style table")]
    UnknownSeries(String),

    #[error("unable to render chart: {0}")]
    Render(String),

    #[error("unable to load style table {}: {reason}", .path.display())]
    ConfigLoad { path: PathBuf, reason: String },
}

impl PlotError {
    pub fn malformed(row: usize, reason: impl Into<String>) -> PlotError {
        PlotError::MalformedRecord {
            row,
            reason: reason.into(),
        }
    }

    pub fn config(path: impl Into<PathBuf>, reason: impl ToString) -> PlotError {
        PlotError::ConfigLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
