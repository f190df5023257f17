/// Running mean of every prefix: element `i` is the mean of `values[..=i]`.
pub fn expanding_mean(values: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            total += v;
            total / (i + 1) as f64
        })
        .collect()
}

/// Percentage of `part` in `total`, rounded to two decimals. 0.0 when `total` is 0.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
