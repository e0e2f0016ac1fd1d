//! Numeric helpers shared by the trial runner and the metrics reporter.

/// Percentage difference of `actual` against a `baseline` reward, rounded to an integer.
///
/// The difference is relative to `|actual|`. When `actual` is zero the
/// difference is divided by 100 instead.
pub fn reward_diff_percentage(actual: f32, baseline: f32) -> i64 {
    if actual == 0.0 {
        ((actual - baseline) / 100.0).round() as i64
    } else {
        ((actual - baseline) / actual.abs() * 100.0).round() as i64
    }
}

/// Mean and population standard deviation.
///
/// Returns `None` for an empty slice.
pub fn mean_std(values: &[f32]) -> Option<(f32, f32)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    Some((mean, var.sqrt()))
}

/// Rounds `v` to `digits` decimal places.
pub fn round_to(v: f32, digits: i32) -> f32 {
    let scale = 10f32.powi(digits);
    (v * scale).round() / scale
}
