/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentile: sorts ascending and takes index
/// `ceil(p/100 * n) - 1`, clamped to the slice. Returns 0.0 for empty input.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    sorted[index]
}

/// `part / total`, or 0.0 when `total` is zero.
pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_nearest_rank() {
        let values = [100.0, 5.0, 20.0, 10.0, 15.0];
        assert_eq!(percentile(&values, 50.0), 15.0);
        assert_eq!(percentile(&values, 90.0), 100.0);
        assert_eq!(percentile(&values, 100.0), 100.0);
        assert_eq!(percentile(&values, 0.0), 5.0);
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(percentile(&[], 90.0), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(ratio(3, 0), 0.0);
    }

    #[test]
    fn test_single_value() {
        assert_eq!(percentile(&[42.0], 50.0), 42.0);
        assert_eq!(percentile(&[42.0], 90.0), 42.0);
    }

    #[test]
    fn test_mean_and_ratio() {
        assert_eq!(mean(&[5.0, 10.0, 15.0, 20.0, 100.0]), 30.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
