//! Summary charts for repeated-trial benchmark timings.
//!
//! Rows of aggregate timing statistics are parsed into
//! [`record::MeasurementRecord`]s, grouped into [`series::Series`] with a 95%
//! confidence margin per point, colored by a [`style::VisualEncoding`] and
//! drawn as SVG by [`plot`]. [`aggregate`] produces those rows from raw
//! per-trial timings.

pub mod aggregate;
pub mod error;
pub mod plot;
pub mod record;
pub mod series;
pub mod stats;
pub mod style;

pub use error::PlotError;
