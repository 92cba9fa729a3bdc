use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::db::Alert;

use super::PressureService;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Dashboard counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total: u64,
    pub open: u64,
}

impl PressureService {
    /// Newest first, across all subjects when `subject_id` is `None`.
    pub async fn list_alerts(&self, subject_id: Option<&str>) -> Result<Vec<Alert>> {
        match subject_id {
            Some(subject_id) => self.db.list_alerts_for_subject(subject_id).await,
            None => self.db.list_alerts().await,
        }
    }

    pub async fn alert_summary(&self, subject_id: Option<&str>) -> Result<AlertSummary> {
        let total = self.db.count_alerts(subject_id).await?;
        let open = self.db.count_open_alerts(subject_id).await?;
        Ok(AlertSummary { total, open })
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<Alert> {
        self.db.acknowledge_alert(alert_id).await?;
        log_info!("alert {alert_id} acknowledged");
        self.fetch_alert(alert_id).await
    }

    pub async fn resolve_alert(&self, alert_id: &str, resolved_by: &str) -> Result<Alert> {
        self.db
            .resolve_alert(alert_id, resolved_by, Utc::now())
            .await?;
        log_info!("alert {alert_id} resolved by {resolved_by}");
        self.fetch_alert(alert_id).await
    }

    async fn fetch_alert(&self, alert_id: &str) -> Result<Alert> {
        self.db
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("alert {alert_id} not found"))
    }
}
