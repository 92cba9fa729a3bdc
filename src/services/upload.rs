use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{ingest_session, AlertGeneration, SessionRefs};
use crate::db::{Alert, DataFile, PressureFrame};
use crate::frames::load_session_text;

use super::PressureService;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Who and what an upload belongs to.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub subject_id: String,
    pub uploaded_by: Option<String>,
    pub source_device: Option<String>,
    pub notes: Option<String>,
}

impl UploadRequest {
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub data_file: DataFile,
    pub frame_count: usize,
    pub peak_pressure: u32,
    pub frames: Vec<PressureFrame>,
    pub alerts: Vec<Alert>,
}

impl PressureService {
    /// Ingest a CSV from disk. The file is copied into the data directory.
    pub async fn upload_file(&self, request: &UploadRequest, path: &Path) -> Result<UploadReceipt> {
        let config = self.config();
        let text = load_session_text(path, &config)?;
        self.upload_text(request, &text).await
    }

    /// Parse, score and store one session.
    ///
    /// The session is fully analysed before anything is written, so a
    /// malformed upload leaves no file, data file, frame or alert behind.
    pub async fn upload_text(&self, request: &UploadRequest, text: &str) -> Result<UploadReceipt> {
        let config = self.config();
        let uploaded_at = Utc::now();
        let data_file_id = Uuid::new_v4().to_string();
        let refs = SessionRefs::new(request.subject_id.clone(), data_file_id.clone());

        let emit_alerts = config.alert_generation == AlertGeneration::OnIngest;
        let outcome = ingest_session(text, uploaded_at, &refs, &config, emit_alerts)?;

        let stored_path = self.store_session_file(&request.subject_id, uploaded_at, text)?;

        let data_file = DataFile {
            id: data_file_id.clone(),
            subject_id: request.subject_id.clone(),
            uploaded_by: request.uploaded_by.clone(),
            uploaded_at,
            file_path: stored_path.to_string_lossy().into_owned(),
            source_device: request.source_device.clone(),
            notes: request.notes.clone(),
        };

        let frames: Vec<PressureFrame> = outcome
            .frames
            .iter()
            .map(|record| PressureFrame {
                alerts_evaluated: emit_alerts,
                ..PressureFrame::from_record(Uuid::new_v4().to_string(), data_file_id.clone(), record)
            })
            .collect();

        let alerts: Vec<Alert> = outcome
            .alerts
            .iter()
            .map(|event| {
                let frame_id = frames.get(event.frame_index).map(|f| f.id.clone());
                Alert::from_event(
                    Uuid::new_v4().to_string(),
                    Some(data_file_id.clone()),
                    frame_id,
                    event,
                )
            })
            .collect();

        if let Err(err) = self.db.insert_upload(&data_file, &frames, &alerts).await {
            log_error!("failed to store upload {data_file_id}: {err:#}");
            if let Err(remove_err) = fs::remove_file(&stored_path) {
                log_error!(
                    "failed to remove {} after aborted upload: {remove_err}",
                    stored_path.display()
                );
            }
            return Err(err);
        }

        log_info!(
            "stored upload {} for subject {} ({} frames, {} alerts)",
            data_file.id,
            data_file.subject_id,
            frames.len(),
            alerts.len()
        );

        Ok(UploadReceipt {
            frame_count: frames.len(),
            peak_pressure: outcome.peak_pressure(),
            data_file,
            frames,
            alerts,
        })
    }

    fn store_session_file(
        &self,
        subject_id: &str,
        uploaded_at: DateTime<Utc>,
        text: &str,
    ) -> Result<std::path::PathBuf> {
        fs::create_dir_all(&self.sessions_dir).with_context(|| {
            format!("failed to create sessions directory {}", self.sessions_dir.display())
        })?;

        let suffix = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}_{}.csv",
            file_safe(subject_id),
            uploaded_at.format("%Y%m%d%H%M%S"),
            &suffix[..8]
        );
        let path = self.sessions_dir.join(file_name);

        fs::write(&path, text)
            .with_context(|| format!("failed to write session file {}", path.display()))?;
        Ok(path)
    }
}

fn file_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::file_safe;

    #[test]
    fn subject_ids_are_made_file_safe() {
        assert_eq!(file_safe("patient-12"), "patient-12");
        assert_eq!(file_safe("../etc/passwd"), "___etc_passwd");
    }
}
