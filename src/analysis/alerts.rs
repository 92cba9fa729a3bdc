use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::config::AnalysisConfig;
use crate::error::PipelineError;

pub const HIGH_PRESSURE_ALERT: &str = "HighPressure";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertSeverity {
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::High => "High",
            AlertSeverity::Critical => "Critical",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "High" => Ok(AlertSeverity::High),
            "Critical" => Ok(AlertSeverity::Critical),
            other => Err(PipelineError::malformed(format!("unknown alert severity '{other}'"))),
        }
    }
}

/// Opaque identifiers supplied by the caller for one uploaded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRefs {
    pub subject_id: String,
    pub session_ref: String,
}

impl SessionRefs {
    pub fn new(subject_id: impl Into<String>, session_ref: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            session_ref: session_ref.into(),
        }
    }
}

/// A high-pressure event raised by one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub subject_id: String,
    pub session_ref: String,
    pub frame_index: usize,
    pub severity: AlertSeverity,
    pub alert_type: String,
    pub message: String,
    pub peak_pressure: u32,
    pub threshold: u32,
    pub triggered_at: DateTime<Utc>,
}

/// Severity for a peak, or `None` when it does not cross the alert threshold.
pub fn classify(peak: u32, config: &AnalysisConfig) -> Option<AlertSeverity> {
    if peak <= config.alert_threshold {
        return None;
    }

    if peak > config.critical_threshold {
        Some(AlertSeverity::Critical)
    } else {
        Some(AlertSeverity::High)
    }
}

/// Decide whether a frame raises an alert.
///
/// `emit == false` skips the decision entirely (e.g. a frame that has
/// already been viewed). Each frame is judged on its own.
pub fn evaluate_alert(
    frame_index: usize,
    captured_at: DateTime<Utc>,
    peak: u32,
    refs: &SessionRefs,
    config: &AnalysisConfig,
    emit: bool,
) -> Option<AlertEvent> {
    if !emit {
        return None;
    }

    let severity = classify(peak, config)?;

    Some(AlertEvent {
        subject_id: refs.subject_id.clone(),
        session_ref: refs.session_ref.clone(),
        frame_index,
        severity,
        alert_type: HIGH_PRESSURE_ALERT.to_string(),
        message: format!(
            "Peak pressure {peak} exceeded threshold {} on frame {frame_index}",
            config.alert_threshold
        ),
        peak_pressure: peak,
        threshold: config.alert_threshold,
        triggered_at: captured_at,
    })
}
