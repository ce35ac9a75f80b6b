use crate::error::PlotError;

/// Two-sided 95% critical value of the standard normal distribution.
pub const Z_95: f64 = 1.96;

/// Half-width of the 95% confidence interval around a sample mean, using the
/// normal approximation (no small-sample t correction).
pub fn error_margin(sample_stddev: f64, sample_size: u64) -> Result<f64, PlotError> {
    if sample_size == 0 {
        return Err(PlotError::DegenerateSample(0));
    }
    Ok(Z_95 * sample_stddev / (sample_size as f64).sqrt())
}

/// Summary of the repeated timings of one benchmark case.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub size: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Unbiased (n - 1) standard deviation, zero for a single sample.
    pub sample_std_dev: f64,
}

impl Stats {
    pub fn compute(data: &[f64]) -> Option<Stats> {
        if data.is_empty() {
            return None;
        }
        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let size = sorted.len();
        let min = sorted[0];
        let max = sorted[size - 1];
        let median = if size % 2 == 1 {
            sorted[size / 2]
        } else {
            (sorted[size / 2 - 1] + sorted[size / 2]) / 2.
        };

        let mean = sorted.iter().sum::<f64>() / size as f64;
        let squares = sorted
            .iter()
            .map(|value| (mean - value).powf(2.))
            .sum::<f64>();
        let sample_std_dev = if size > 1 {
            (squares / (size - 1) as f64).sqrt()
        } else {
            0.
        };

        Some(Stats {
            size,
            min,
            max,
            mean,
            median,
            std_dev: (squares / size as f64).sqrt(),
            sample_std_dev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn margin_at_hundred_samples() {
        assert!(close(error_margin(10., 100).unwrap(), 1.96));
    }

    #[test]
    fn margin_of_single_sample_is_z_times_stddev() {
        assert!(close(error_margin(2., 1).unwrap(), 3.92));
    }

    #[test]
    fn zero_sample_size_is_degenerate() {
        assert!(matches!(
            error_margin(1., 0),
            Err(PlotError::DegenerateSample(0))
        ));
    }

    #[test]
    fn empty_data_has_no_stats() {
        assert_eq!(Stats::compute(&[]), None);
    }

    #[test]
    fn odd_count_summary() {
        let stats = Stats::compute(&[4., 1., 7.]).unwrap();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.min, 1.);
        assert_eq!(stats.max, 7.);
        assert_eq!(stats.median, 4.);
        assert!(close(stats.mean, 4.));
        assert!(close(stats.std_dev, 6f64.sqrt()));
        assert!(close(stats.sample_std_dev, 3.));
    }

    #[test]
    fn even_count_median_averages_middle_pair() {
        let stats = Stats::compute(&[8., 2., 4., 6.]).unwrap();
        assert_eq!(stats.median, 5.);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let stats = Stats::compute(&[3.5]).unwrap();
        assert_eq!(stats.std_dev, 0.);
        assert_eq!(stats.sample_std_dev, 0.);
        assert_eq!(stats.median, 3.5);
    }

    proptest! {
        #[test]
        fn margin_shrinks_as_samples_grow(sd in 0f64..1e6, n in 1u64..100_000) {
            let small = error_margin(sd, n).unwrap();
            let large = error_margin(sd, n + 1).unwrap();
            prop_assert!(large <= small);
            prop_assert!(small >= 0.);
        }

        #[test]
        fn summary_is_bounded(data in proptest::collection::vec(-1e6f64..1e6, 1..64)) {
            let stats = Stats::compute(&data).unwrap();
            prop_assert!(stats.min <= stats.median && stats.median <= stats.max);
            prop_assert!(stats.min <= stats.mean + 1e-6 && stats.mean <= stats.max + 1e-6);
            prop_assert!(stats.std_dev <= stats.sample_std_dev || stats.size == 1);
        }
    }
}
