use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{invalid_column, parse_datetime, parse_optional_datetime, parse_severity, parse_status, to_u32},
    models::{Alert, AlertStatus},
};

const ALERT_COLUMNS: &str = "id, subject_id, data_file_id, frame_id, severity, alert_type, \
     status, message, peak_pressure, triggered_at, resolved_by, resolved_at";

fn row_to_alert(row: &Row) -> Result<Alert, rusqlite::Error> {
    let severity: String = row.get("severity")?;
    let status: String = row.get("status")?;
    let peak_pressure: i64 = row.get("peak_pressure")?;
    let triggered_at: String = row.get("triggered_at")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;

    Ok(Alert {
        id: row.get("id")?,
        subject_id: row.get("subject_id")?,
        data_file_id: row.get("data_file_id")?,
        frame_id: row.get("frame_id")?,
        severity: parse_severity(&severity).map_err(invalid_column)?,
        alert_type: row.get("alert_type")?,
        status: parse_status(&status).map_err(invalid_column)?,
        message: row.get("message")?,
        peak_pressure: to_u32(peak_pressure, "peak_pressure").map_err(invalid_column)?,
        triggered_at: parse_datetime(&triggered_at, "triggered_at").map_err(invalid_column)?,
        resolved_by: row.get("resolved_by")?,
        resolved_at: parse_optional_datetime(resolved_at, "resolved_at").map_err(invalid_column)?,
    })
}

pub(crate) fn insert_alert_row(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "INSERT INTO alerts (
            id,
            subject_id,
            data_file_id,
            frame_id,
            severity,
            alert_type,
            status,
            message,
            peak_pressure,
            triggered_at,
            resolved_by,
            resolved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            alert.id,
            alert.subject_id,
            alert.data_file_id,
            alert.frame_id,
            alert.severity.as_str(),
            alert.alert_type,
            alert.status.as_str(),
            alert.message,
            i64::from(alert.peak_pressure),
            alert.triggered_at.to_rfc3339(),
            alert.resolved_by,
            alert.resolved_at.map(|dt| dt.to_rfc3339()),
        ],
    )
    .with_context(|| format!("failed to insert alert {}", alert.id))?;
    Ok(())
}

fn current_status(conn: &Connection, alert_id: &str) -> Result<AlertStatus> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM alerts WHERE id = ?1",
            params![alert_id],
            |row| row.get(0),
        )
        .optional()?;

    match status {
        Some(status) => parse_status(&status),
        None => bail!("alert {alert_id} not found"),
    }
}

impl Database {
    /// Batch insert alerts.
    pub async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let alerts = alerts.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for alert in &alerts {
                insert_alert_row(&tx, alert)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        let alert_id = alert_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1");
            let alert = conn
                .query_row(&sql, params![alert_id], row_to_alert)
                .optional()?;
            Ok(alert)
        })
        .await
    }

    /// Alerts for one subject, newest first.
    pub async fn list_alerts_for_subject(&self, subject_id: &str) -> Result<Vec<Alert>> {
        let subject_id = subject_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE subject_id = ?1
                 ORDER BY triggered_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let alerts = stmt
                .query_map(params![subject_id], row_to_alert)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
        .await
    }

    /// Every alert, newest first.
    pub async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.execute(|conn| {
            let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY triggered_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let alerts = stmt
                .query_map([], row_to_alert)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
        .await
    }

    pub async fn get_alerts_for_frame(&self, frame_id: &str) -> Result<Vec<Alert>> {
        let frame_id = frame_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE frame_id = ?1
                 ORDER BY triggered_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let alerts = stmt
                .query_map(params![frame_id], row_to_alert)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
        .await
    }

    /// All alerts, optionally for one subject.
    pub async fn count_alerts(&self, subject_id: Option<&str>) -> Result<u64> {
        let subject_id = subject_id.map(str::to_string);
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM alerts
                 WHERE ?1 IS NULL OR subject_id = ?1",
                params![subject_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Alerts not yet resolved, optionally for one subject.
    pub async fn count_open_alerts(&self, subject_id: Option<&str>) -> Result<u64> {
        let subject_id = subject_id.map(str::to_string);
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM alerts
                 WHERE status != 'Resolved'
                   AND (?1 IS NULL OR subject_id = ?1)",
                params![subject_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<()> {
        let alert_id = alert_id.to_string();
        self.execute(move |conn| {
            match current_status(conn, &alert_id)? {
                AlertStatus::Open => {}
                AlertStatus::Acknowledged => return Ok(()),
                AlertStatus::Resolved => bail!("alert {alert_id} is already resolved"),
            }

            conn.execute(
                "UPDATE alerts SET status = ?1 WHERE id = ?2",
                params![AlertStatus::Acknowledged.as_str(), alert_id],
            )
            .with_context(|| format!("failed to acknowledge alert {alert_id}"))?;
            Ok(())
        })
        .await
    }

    pub async fn resolve_alert(
        &self,
        alert_id: &str,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        let alert_id = alert_id.to_string();
        let resolved_by = resolved_by.to_string();
        self.execute(move |conn| {
            if current_status(conn, &alert_id)? == AlertStatus::Resolved {
                bail!("alert {alert_id} is already resolved");
            }

            conn.execute(
                "UPDATE alerts
                 SET status = ?1,
                     resolved_by = ?2,
                     resolved_at = ?3
                 WHERE id = ?4",
                params![
                    AlertStatus::Resolved.as_str(),
                    resolved_by,
                    resolved_at.to_rfc3339(),
                    alert_id,
                ],
            )
            .with_context(|| format!("failed to resolve alert {alert_id}"))?;
            Ok(())
        })
        .await
    }
}
