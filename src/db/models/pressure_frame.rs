use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{FrameRecord, TrendPoint};
use crate::db::models::Alert;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PressureFrame {
    pub id: String,
    pub data_file_id: String,
    /// Position of the frame within its CSV session (0, 1, 2, ...)
    pub frame_index: u64,
    pub captured_at: DateTime<Utc>,
    pub peak_pressure: u32,
    pub average_pressure: f64,
    /// Contact area as a percentage (0-100)
    pub contact_area_percent: f64,
    pub risk_score: f64,
    /// Set the first time the frame's heatmap is opened
    pub viewed_at: Option<DateTime<Utc>>,
    /// Alert decision already made for this frame (at upload or first view)
    pub alerts_evaluated: bool,
}

impl PressureFrame {
    pub fn from_record(id: String, data_file_id: String, record: &FrameRecord) -> Self {
        Self {
            id,
            data_file_id,
            frame_index: record.frame_index as u64,
            captured_at: record.captured_at,
            peak_pressure: record.metrics.peak_pressure,
            average_pressure: record.metrics.average_pressure,
            contact_area_percent: record.metrics.contact_area_percent,
            risk_score: record.metrics.risk_score,
            viewed_at: None,
            alerts_evaluated: false,
        }
    }

    pub fn trend_point(&self) -> TrendPoint {
        TrendPoint {
            timestamp: self.captured_at,
            peak_pressure: self.peak_pressure,
            contact_area: self.contact_area_percent,
        }
    }
}

/// Result of recording a heatmap view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameView {
    /// This call set `viewed_at`
    pub first_view: bool,
    /// Alerts stored by this view
    pub alerts: Vec<Alert>,
}
