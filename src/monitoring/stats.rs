//! Pure statistics over a slice of `rps` readings.
//!
//! Nothing in here knows about locks or samples; the window feeds these
//! helpers a snapshot of its values while it holds the write lock.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation around a precomputed mean.
///
/// Returns exactly `0.0` for identical readings and whenever the variance is
/// not strictly positive, so a constant window never publishes `NaN`. The
/// identical case is checked on the inputs, since a float mean of e.g. `0.1`
/// is not exactly `0.1` and would leave rounding noise in the variance.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let Some(first) = values.first() else {
        return 0.0;
    };
    if values.iter().all(|v| v == first) {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / values.len() as f64;

    if variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

/// Standard score of `value`. `None` when `std_dev` is zero.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if std_dev > 0.0 {
        Some((value - mean) / std_dev)
    } else {
        None
    }
}
