//! Fixed-precision rounding and the small statistics used by the pipeline.
//!
//! Probe averages are kept at 3 decimals and error components at 4, applied
//! consistently so identical inputs always produce identical outputs.

/// Round to probe precision (3 decimals).
pub fn round3(value: f64) -> f64 {
    (value * 1e3).round() / 1e3
}

/// Round to error/geometry precision (4 decimals).
pub fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

/// Arithmetic mean. Empty input yields NaN.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median with the usual mid-pair average for even counts. Empty input
/// yields NaN.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_precision() {
        assert_eq!(round3(10.02349), 10.023);
        assert_eq!(round3(-0.0015), -0.002);
        assert_eq!(round4(0.00049), 0.0005);
        assert_eq!(round4(-1.23456), -1.2346);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_median_resists_one_outlier() {
        let base = vec![1.0, 1.0, 1.0, 1.0, 2.0];
        let mut spiked = base.clone();
        spiked[4] = 1000.0;
        assert_eq!(median(&base), 1.0);
        assert_eq!(median(&spiked), 1.0);
    }

    #[test]
    fn test_mean_of_samples() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
    }
}
