use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// When alert decisions are evaluated for a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlertGeneration {
    /// Alerts are raised while the upload is processed.
    OnIngest,
    /// Alerts are raised the first time a frame's heatmap is opened.
    OnFirstView,
}

impl AlertGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertGeneration::OnIngest => "on-ingest",
            AlertGeneration::OnFirstView => "on-first-view",
        }
    }
}

impl FromStr for AlertGeneration {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "on-ingest" => Ok(AlertGeneration::OnIngest),
            "on-first-view" => Ok(AlertGeneration::OnFirstView),
            other => Err(PipelineError::range(format!(
                "unknown alert generation mode '{other}'"
            ))),
        }
    }
}

/// Tunable thresholds for frame analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Rows (CSV lines) per frame
    pub frame_height: usize,
    /// Readings per row
    pub frame_width: usize,

    /// Uploads larger than this are refused before any slicing
    pub max_session_bytes: usize,

    /// A cell at or above this reading counts as in contact
    pub activation_threshold: u32,

    /// Risk score weighting: peak is scaled against `peak_scale`,
    /// contact area against 100%.
    pub peak_scale: f64,
    pub weight_peak: f64,
    pub weight_contact: f64,

    /// Peak strictly above this raises an alert
    pub alert_threshold: u32,
    /// Peak strictly above this makes the alert Critical instead of High
    pub critical_threshold: u32,
    pub alert_generation: AlertGeneration,

    /// Most recent frames considered for a subject's trend
    pub trend_window_frames: usize,
    pub trend_max_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_height: 32,
            frame_width: 32,
            max_session_bytes: 64 * 1024 * 1024,
            activation_threshold: 10,
            peak_scale: 255.0,
            weight_peak: 60.0,
            weight_contact: 40.0,
            alert_threshold: 120,
            critical_threshold: 220,
            alert_generation: AlertGeneration::OnIngest,
            trend_window_frames: 2000,
            trend_max_points: 24,
        }
    }
}

impl AnalysisConfig {
    pub fn cells_per_frame(&self) -> usize {
        self.frame_height * self.frame_width
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.frame_height == 0 || self.frame_width == 0 {
            return Err(PipelineError::range(format!(
                "frame dimensions must be non-zero (got {}x{})",
                self.frame_height, self.frame_width
            )));
        }

        if self.peak_scale <= 0.0 || !self.peak_scale.is_finite() {
            return Err(PipelineError::range(format!(
                "peak scale must be a positive number (got {})",
                self.peak_scale
            )));
        }

        if self.critical_threshold < self.alert_threshold {
            return Err(PipelineError::range(format!(
                "critical threshold {} is below alert threshold {}",
                self.critical_threshold, self.alert_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cells_per_frame(), 1024);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let config = AnalysisConfig {
            alert_threshold: 180,
            critical_threshold: 150,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), "Range");
    }

    #[test]
    fn zero_width_is_rejected() {
        let config = AnalysisConfig {
            frame_width: 0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"alertThreshold":180}"#).unwrap();
        assert_eq!(config.alert_threshold, 180);
        assert_eq!(config.critical_threshold, 220);
        assert_eq!(config.alert_generation, AlertGeneration::OnIngest);
    }

    #[test]
    fn alert_generation_parses_cli_spelling() {
        assert_eq!(
            "on-first-view".parse::<AlertGeneration>().unwrap(),
            AlertGeneration::OnFirstView
        );
        assert!("sometimes".parse::<AlertGeneration>().is_err());
    }
}
