use serde::{Deserialize, Serialize};

use crate::analysis::config::AnalysisConfig;
use crate::frames::PressureMatrix;

/// Derived readings for one frame. Pure function of the matrix and config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetrics {
    pub peak_pressure: u32,
    pub average_pressure: f64,
    pub contact_area_percent: f64,
    pub risk_score: f64,
}

impl FrameMetrics {
    pub fn compute(matrix: &PressureMatrix, config: &AnalysisConfig) -> Self {
        let peak_pressure = peak(matrix);
        let contact_area_percent = contact_area_percent(matrix, config.activation_threshold);

        Self {
            peak_pressure,
            average_pressure: average(matrix),
            contact_area_percent,
            risk_score: weighted_risk_score(peak_pressure, contact_area_percent, config),
        }
    }
}

/// Highest reading in the matrix, 0 when empty.
pub fn peak(matrix: &PressureMatrix) -> u32 {
    matrix.cells().iter().copied().max().unwrap_or(0)
}

/// Mean reading across all cells, 0 when empty.
pub fn average(matrix: &PressureMatrix) -> f64 {
    let count = matrix.len();
    if count == 0 {
        return 0.0;
    }

    let total: u64 = matrix.cells().iter().map(|v| u64::from(*v)).sum();
    total as f64 / count as f64
}

/// Percentage (0-100) of cells at or above `threshold`, 0 when empty.
pub fn contact_area_percent(matrix: &PressureMatrix, threshold: u32) -> f64 {
    let total = matrix.len();
    if total == 0 {
        return 0.0;
    }

    let active = matrix.cells().iter().filter(|v| **v >= threshold).count();
    active as f64 / total as f64 * 100.0
}

/// 60% from peak against a 0-255 scale, 40% from contact area.
///
/// Not clamped: a peak above 255 pushes the score past 100.
pub fn risk_score(peak: u32, contact_area: f64) -> f64 {
    weighted_risk_score(peak, contact_area, &AnalysisConfig::default())
}

pub fn weighted_risk_score(peak: u32, contact_area: f64, config: &AnalysisConfig) -> f64 {
    let score = f64::from(peak) / config.peak_scale * config.weight_peak
        + contact_area / 100.0 * config.weight_contact;
    round_2dp(score)
}

/// Two-decimal rounding, ties to even.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
