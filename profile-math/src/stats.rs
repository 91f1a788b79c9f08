//! Small statistics helpers used by the clipping loop.

/// Root mean square of a set of residuals.
///
/// Returns NaN for an empty slice so callers see the problem instead of a
/// silent zero.
pub fn rms(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return f64::NAN;
    }
    let sum_sq: f64 = residuals.iter().map(|r| r * r).sum();
    (sum_sq / residuals.len() as f64).sqrt()
}

/// Largest absolute value in the slice, ignoring NaN. Zero for an empty slice.
pub fn max_abs(values: &[f64]) -> f64 {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Number of set entries in a boolean mask
pub fn count_active(mask: &[bool]) -> usize {
    mask.iter().filter(|&&m| m).count()
}
