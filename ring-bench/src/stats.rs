//! Descriptive statistics over benchmark samples.

use serde::{Deserialize, Serialize};

/// Mean, population standard deviation and range of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation (divides by `count`).
    pub stddev: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
}

impl SampleStats {
    /// Reduce `samples`; `None` for an empty set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let count = samples.len();
        let n = count as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count,
            mean,
            stddev: variance.sqrt(),
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_two_three() {
        let stats = SampleStats::from_samples(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.stddev - 0.816_496_580_927_726).abs() < 1e-9);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn empty_has_no_statistics() {
        assert!(SampleStats::from_samples(&[]).is_none());
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let stats = SampleStats::from_samples(&[4.5]).unwrap();
        assert_eq!(stats.mean, 4.5);
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.min, stats.max);
    }
}
