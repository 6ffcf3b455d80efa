//! Small numeric helpers shared by the scorer and the feature builder.

use statrs::statistics::Statistics;

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    Statistics::mean(data)
}

/// Observed `(min, max)` of a slice, `None` when it is empty.
pub fn min_max(data: &[f64]) -> Option<(f64, f64)> {
    if data.is_empty() {
        return None;
    }
    Some((Statistics::min(data), Statistics::max(data)))
}

/// Relative closeness check used by round-trip assertions.
pub fn approx_eq_relative(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance * scale
}
