use serde::Serialize;

use crate::game::judgment::Judgment;

/// Spread of signed tap errors over one play. Misses, holds and let-gos
/// carry no error and are skipped.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean_abs_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub max_abs_ms: f64,
    pub count: usize,
}

pub fn compute_timing_stats(judgments: &[Judgment]) -> TimingStats {
    let errors = || judgments.iter().filter_map(|j| j.time_error_ms);

    let mut sum_abs = 0.0;
    let mut sum_signed = 0.0;
    let mut max_abs: f64 = 0.0;
    let mut count = 0usize;
    for e in errors() {
        sum_abs += e.abs();
        sum_signed += e;
        max_abs = max_abs.max(e.abs());
        count += 1;
    }
    if count == 0 {
        return TimingStats::default();
    }

    let n = count as f64;
    let mean_ms = sum_signed / n;
    // Sample standard deviation of the signed errors.
    let stddev_ms = if count > 1 {
        let sq: f64 = errors().map(|e| (e - mean_ms).powi(2)).sum();
        (sq / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats {
        mean_abs_ms: sum_abs / n,
        mean_ms,
        stddev_ms,
        max_abs_ms: max_abs,
        count,
    }
}
