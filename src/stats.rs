//! Series statistics shared by the skill and dimension scoring paths.
//!
//! Inputs are raw scores on the 1-5 rating scale unless noted.

use crate::models::Trend;

/// Projects a 1-5 rating onto 0-100.
pub const SCALE: f64 = 20.0;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// 100 for an unvarying window, falling by 20 per rating point of spread.
/// An empty window scores 0.
pub fn consistency(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (100.0 - std_dev(values) * SCALE).clamp(0.0, 100.0)
}

/// Change in slope between the last three points and the three before them.
/// `values` must be in chronological order. Positive means accelerating.
pub fn momentum(values: &[f64]) -> f64 {
    let len = values.len();
    if len < 3 {
        return 0.0;
    }
    let recent = average_step(&values[len - 3..]);
    let older = average_step(&values[len.saturating_sub(6)..len - 3]);
    recent - older
}

/// Sum of successive differences over a three-point span, halved.
fn average_step(window: &[f64]) -> f64 {
    window.windows(2).map(|pair| pair[1] - pair[0]).sum::<f64>() / 2.0
}

/// Percentage change from `previous` to `current`; 0 when `previous` is not positive.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

pub fn classify_trend(growth_rate: f64, band: f64) -> Trend {
    if growth_rate > band {
        Trend::Improving
    } else if growth_rate < -band {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
