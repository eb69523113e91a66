//! Weather/cancellation correlation diagnostics
//!
//! Pearson correlations with a Student-t p-value (statrs), reported next to
//! each calibration proposal so an operator can see whether wind, waves and
//! the predicted score actually track cancellations in the window.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::config::defaults::{CORRELATION_MIN_SAMPLES, SIGNIFICANCE_THRESHOLD};
use crate::types::PredictionOutcome;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correlation {
    pub x: String,
    pub y: String,
    pub r: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub sample_count: usize,
    pub significant: bool,
}

/// Pearson correlation of `x` and `y`, `None` below the sample minimum or
/// on mismatched lengths.
pub fn correlate(x: &[f64], y: &[f64], x_name: &str, y_name: &str) -> Option<Correlation> {
    let n = x.len();
    if n < CORRELATION_MIN_SAMPLES || n != y.len() {
        return None;
    }

    let r = pearson(x, y);
    let p_value = p_value_for_r(r, n);
    Some(Correlation {
        x: x_name.to_string(),
        y: y_name.to_string(),
        r,
        r_squared: r * r,
        p_value,
        sample_count: n,
        significant: p_value < SIGNIFICANCE_THRESHOLD,
    })
}

/// r = Σ[(xi - x̄)(yi - ȳ)] / sqrt(Σ(xi - x̄)² × Σ(yi - ȳ)²)
#[allow(clippy::cast_precision_loss)]
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|b| b * b).sum();

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x.powi(2)) * (n * sum_y2 - sum_y.powi(2))).sqrt();

    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        (numerator / denominator).clamp(-1.0, 1.0)
    }
}

/// Two-tailed p-value from t = r·sqrt(n-2)/sqrt(1-r²) with n-2 degrees of
/// freedom.
#[allow(clippy::cast_precision_loss)]
fn p_value_for_r(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    if r.abs() >= 0.9999 {
        return 0.0;
    }

    let df = (n - 2) as f64;
    let t_stat = r * df.sqrt() / (1.0 - r * r).sqrt();

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => 2.0 * (1.0 - t_dist.cdf(t_stat.abs())),
        Err(_) => 1.0,
    }
}

/// Diagnostics over one calibration window:
///
/// - forecast wind vs wave height, over cancelled sailings with a wave forecast
/// - forecast wind vs cancellation (0/1), over all sailings
/// - predicted score vs cancellation (0/1), over all sailings
///
/// Strongest first.
pub fn window_diagnostics(outcomes: &[PredictionOutcome]) -> Vec<Correlation> {
    let (cancel_wind, cancel_wave): (Vec<f64>, Vec<f64>) = outcomes
        .iter()
        .filter(|o| o.actually_cancelled())
        .filter_map(|o| o.forecast_wave.map(|w| (o.forecast_wind, w)))
        .unzip();

    let cancelled: Vec<f64> = outcomes
        .iter()
        .map(|o| if o.actually_cancelled() { 1.0 } else { 0.0 })
        .collect();
    let wind: Vec<f64> = outcomes.iter().map(|o| o.forecast_wind).collect();
    let score: Vec<f64> = outcomes.iter().map(|o| o.predicted_score).collect();

    let mut found: Vec<Correlation> = [
        correlate(&cancel_wind, &cancel_wave, "forecast_wind", "forecast_wave"),
        correlate(&wind, &cancelled, "forecast_wind", "cancelled"),
        correlate(&score, &cancelled, "predicted_score", "cancelled"),
    ]
    .into_iter()
    .flatten()
    .collect();

    found.sort_by(|a, b| b.r.abs().total_cmp(&a.r.abs()));
    found
}
