//! Guarded numeric helpers shared by the screening stages.
//!
//! Every function returns `None` instead of producing NaN or infinity.

/// Arithmetic mean; `None` for an empty slice or a non-finite result.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    avg.is_finite().then_some(avg)
}

/// Simple moving average of the last `window` values.
///
/// `None` when fewer than `window` values exist.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    mean(&values[values.len() - window..])
}

/// Maximum of a slice; `None` when empty.
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Minimum of a slice; `None` when empty.
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// `numerator / denominator` when the denominator is positive and the result finite.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator <= 0.0 {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn test_sma_uses_tail() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 2), Some(4.5));
        assert_eq!(sma(&values, 5), Some(3.0));
        assert_eq!(sma(&values, 6), None);
        assert_eq!(sma(&values, 0), None);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(max(&[3.0, 9.0, 1.0]), Some(9.0));
        assert_eq!(min(&[3.0, 9.0, 1.0]), Some(1.0));
        assert_eq!(max(&[]), None);
    }

    #[test]
    fn test_ratio_guards() {
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(ratio(1.0, -2.0), None);
        assert_eq!(ratio(3.0, 2.0), Some(1.5));
        assert_eq!(ratio(f64::INFINITY, 2.0), None);
    }
}
