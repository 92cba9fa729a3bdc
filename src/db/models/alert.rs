use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AlertEvent, AlertSeverity};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "Open",
            AlertStatus::Acknowledged => "Acknowledged",
            AlertStatus::Resolved => "Resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub subject_id: String,
    pub data_file_id: Option<String>,
    /// Frame that raised the alert, when it came from a frame
    pub frame_id: Option<String>,
    pub severity: AlertSeverity,
    pub alert_type: String,
    pub status: AlertStatus,
    pub message: Option<String>,
    pub peak_pressure: u32,
    pub triggered_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Storage row for an event; the caller supplies the ids.
    pub fn from_event(
        id: String,
        data_file_id: Option<String>,
        frame_id: Option<String>,
        event: &AlertEvent,
    ) -> Self {
        Self {
            id,
            subject_id: event.subject_id.clone(),
            data_file_id,
            frame_id,
            severity: event.severity,
            alert_type: event.alert_type.clone(),
            status: AlertStatus::Open,
            message: Some(event.message.clone()),
            peak_pressure: event.peak_pressure,
            triggered_at: event.triggered_at,
            resolved_by: None,
            resolved_at: None,
        }
    }
}
