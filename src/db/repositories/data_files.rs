use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{invalid_column, parse_datetime},
    models::{Alert, DataFile, PressureFrame},
    repositories::{alerts::insert_alert_row, frames::insert_frame_row},
};

fn row_to_data_file(row: &Row) -> Result<DataFile, rusqlite::Error> {
    let uploaded_at: String = row.get("uploaded_at")?;

    Ok(DataFile {
        id: row.get("id")?,
        subject_id: row.get("subject_id")?,
        uploaded_by: row.get("uploaded_by")?,
        uploaded_at: parse_datetime(&uploaded_at, "uploaded_at").map_err(invalid_column)?,
        file_path: row.get("file_path")?,
        source_device: row.get("source_device")?,
        notes: row.get("notes")?,
    })
}

const DATA_FILE_COLUMNS: &str =
    "id, subject_id, uploaded_by, uploaded_at, file_path, source_device, notes";

impl Database {
    /// Store an upload with its frames and alerts in one transaction.
    pub async fn insert_upload(
        &self,
        data_file: &DataFile,
        frames: &[PressureFrame],
        alerts: &[Alert],
    ) -> Result<()> {
        let record = data_file.clone();
        let frames = frames.to_vec();
        let alerts = alerts.to_vec();

        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO data_files (
                    id,
                    subject_id,
                    uploaded_by,
                    uploaded_at,
                    file_path,
                    source_device,
                    notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.subject_id,
                    record.uploaded_by,
                    record.uploaded_at.to_rfc3339(),
                    record.file_path,
                    record.source_device,
                    record.notes,
                ],
            )
            .with_context(|| format!("failed to insert data file {}", record.id))?;

            for frame in &frames {
                insert_frame_row(&tx, frame)?;
            }

            for alert in &alerts {
                insert_alert_row(&tx, alert)?;
            }

            tx.commit().context("failed to commit upload")?;
            Ok(())
        })
        .await
    }

    pub async fn get_data_file(&self, data_file_id: &str) -> Result<Option<DataFile>> {
        let data_file_id = data_file_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {DATA_FILE_COLUMNS} FROM data_files WHERE id = ?1");
            let data_file = conn
                .query_row(&sql, params![data_file_id], row_to_data_file)
                .optional()?;
            Ok(data_file)
        })
        .await
    }

    /// Most recent upload for a subject.
    pub async fn latest_data_file_for_subject(&self, subject_id: &str) -> Result<Option<DataFile>> {
        let subject_id = subject_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {DATA_FILE_COLUMNS} FROM data_files
                 WHERE subject_id = ?1
                 ORDER BY uploaded_at DESC
                 LIMIT 1"
            );
            let data_file = conn
                .query_row(&sql, params![subject_id], row_to_data_file)
                .optional()?;
            Ok(data_file)
        })
        .await
    }

    pub async fn list_data_files_for_subject(&self, subject_id: &str) -> Result<Vec<DataFile>> {
        let subject_id = subject_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {DATA_FILE_COLUMNS} FROM data_files
                 WHERE subject_id = ?1
                 ORDER BY uploaded_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let files = stmt
                .query_map(params![subject_id], row_to_data_file)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(files)
        })
        .await
    }
}
