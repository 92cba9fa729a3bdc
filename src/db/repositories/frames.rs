use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{invalid_column, parse_datetime, parse_optional_datetime, to_i64, to_u32, to_u64},
    models::{Alert, FrameView, PressureFrame},
    repositories::alerts::insert_alert_row,
};

const FRAME_COLUMNS: &str = "id, data_file_id, frame_index, captured_at, peak_pressure, \
     average_pressure, contact_area_percent, risk_score, viewed_at, alerts_evaluated";

fn row_to_frame(row: &Row) -> Result<PressureFrame, rusqlite::Error> {
    let captured_at: String = row.get("captured_at")?;
    let viewed_at: Option<String> = row.get("viewed_at")?;
    let frame_index: i64 = row.get("frame_index")?;
    let peak_pressure: i64 = row.get("peak_pressure")?;

    Ok(PressureFrame {
        id: row.get("id")?,
        data_file_id: row.get("data_file_id")?,
        frame_index: to_u64(frame_index, "frame_index").map_err(invalid_column)?,
        captured_at: parse_datetime(&captured_at, "captured_at").map_err(invalid_column)?,
        peak_pressure: to_u32(peak_pressure, "peak_pressure").map_err(invalid_column)?,
        average_pressure: row.get("average_pressure")?,
        contact_area_percent: row.get("contact_area_percent")?,
        risk_score: row.get("risk_score")?,
        viewed_at: parse_optional_datetime(viewed_at, "viewed_at").map_err(invalid_column)?,
        alerts_evaluated: row.get("alerts_evaluated")?,
    })
}

pub(crate) fn insert_frame_row(conn: &Connection, frame: &PressureFrame) -> Result<()> {
    conn.execute(
        "INSERT INTO pressure_frames (
            id,
            data_file_id,
            frame_index,
            captured_at,
            peak_pressure,
            average_pressure,
            contact_area_percent,
            risk_score,
            viewed_at,
            alerts_evaluated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            frame.id,
            frame.data_file_id,
            to_i64(frame.frame_index)?,
            frame.captured_at.to_rfc3339(),
            i64::from(frame.peak_pressure),
            frame.average_pressure,
            frame.contact_area_percent,
            frame.risk_score,
            frame.viewed_at.map(|dt| dt.to_rfc3339()),
            frame.alerts_evaluated,
        ],
    )
    .with_context(|| format!("failed to insert frame {}", frame.frame_index))?;
    Ok(())
}

impl Database {
    pub async fn get_frame(&self, frame_id: &str) -> Result<Option<PressureFrame>> {
        let frame_id = frame_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {FRAME_COLUMNS} FROM pressure_frames WHERE id = ?1");
            let frame = conn
                .query_row(&sql, params![frame_id], row_to_frame)
                .optional()?;
            Ok(frame)
        })
        .await
    }

    /// All frames of one upload in session order.
    pub async fn get_frames_for_data_file(&self, data_file_id: &str) -> Result<Vec<PressureFrame>> {
        let data_file_id = data_file_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {FRAME_COLUMNS} FROM pressure_frames
                 WHERE data_file_id = ?1
                 ORDER BY frame_index ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let frames = stmt
                .query_map(params![data_file_id], row_to_frame)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(frames)
        })
        .await
    }

    pub async fn latest_frame_for_data_file(
        &self,
        data_file_id: &str,
    ) -> Result<Option<PressureFrame>> {
        let data_file_id = data_file_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {FRAME_COLUMNS} FROM pressure_frames
                 WHERE data_file_id = ?1
                 ORDER BY captured_at DESC, frame_index DESC
                 LIMIT 1"
            );
            let frame = conn
                .query_row(&sql, params![data_file_id], row_to_frame)
                .optional()?;
            Ok(frame)
        })
        .await
    }

    /// The `limit` most recent frames across all of a subject's uploads,
    /// returned oldest first.
    pub async fn recent_frames_for_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<PressureFrame>> {
        let subject_id = subject_id.to_string();
        let limit = to_i64(limit as u64)?;
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {FRAME_COLUMNS} FROM (
                    SELECT f.* FROM pressure_frames f
                    JOIN data_files d ON d.id = f.data_file_id
                    WHERE d.subject_id = ?1
                    ORDER BY f.captured_at DESC, f.frame_index DESC
                    LIMIT ?2
                 )
                 ORDER BY captured_at ASC, frame_index ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let frames = stmt
                .query_map(params![subject_id, limit], row_to_frame)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(frames)
        })
        .await
    }

    /// Record that a frame's heatmap was opened, in one transaction.
    ///
    /// `viewed_at` is only set by the first view. `pending_alerts` carries a
    /// view-time alert decision; it is stored only if no decision was made
    /// for the frame before (at upload or on an earlier view), and the frame
    /// is then marked evaluated. On error nothing is written.
    pub async fn record_frame_view(
        &self,
        frame_id: &str,
        viewed_at: DateTime<Utc>,
        pending_alerts: Option<Vec<Alert>>,
    ) -> Result<FrameView> {
        let frame_id = frame_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let first_view = tx
                .execute(
                    "UPDATE pressure_frames
                     SET viewed_at = ?1
                     WHERE id = ?2 AND viewed_at IS NULL",
                    params![viewed_at.to_rfc3339(), frame_id],
                )
                .with_context(|| format!("failed to mark frame {frame_id} viewed"))?
                == 1;

            let mut alerts = Vec::new();
            if let Some(pending) = pending_alerts {
                let claimed = tx.execute(
                    "UPDATE pressure_frames
                     SET alerts_evaluated = 1
                     WHERE id = ?1 AND alerts_evaluated = 0",
                    params![frame_id],
                )? == 1;

                if claimed {
                    for alert in &pending {
                        insert_alert_row(&tx, alert)?;
                    }
                    alerts = pending;
                }
            }

            tx.commit()
                .with_context(|| format!("failed to record view of frame {frame_id}"))?;
            Ok(FrameView { first_view, alerts })
        })
        .await
    }
}
