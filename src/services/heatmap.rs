use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{evaluate_alert, AlertGeneration, FrameMetrics, SessionRefs};
use crate::db::{Alert, PressureFrame};
use crate::error::PipelineError;
use crate::frames::{load_session_text, PressureMatrix, SessionReader};

use super::PressureService;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// One frame's grid plus its metrics, as shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub frame_id: String,
    pub data_file_id: String,
    pub subject_id: String,
    pub frame_index: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: FrameMetrics,
    pub values: PressureMatrix,
    /// Alerts raised by this view (only under on-first-view generation,
    /// and only for a frame with no earlier alert decision).
    pub new_alerts: Vec<Alert>,
}

impl PressureService {
    pub async fn heatmap_for_frame(&self, frame_id: &str) -> Result<Heatmap> {
        let frame = self
            .db
            .get_frame(frame_id)
            .await?
            .ok_or_else(|| PipelineError::missing(format!("frame {frame_id} not found")))?;
        self.render_heatmap(frame).await
    }

    /// Heatmap of the last frame of the subject's most recent upload.
    pub async fn latest_heatmap(&self, subject_id: &str) -> Result<Heatmap> {
        let data_file = self
            .db
            .latest_data_file_for_subject(subject_id)
            .await?
            .ok_or_else(|| {
                PipelineError::missing(format!("no uploads for subject {subject_id}"))
            })?;

        let frame = self
            .db
            .latest_frame_for_data_file(&data_file.id)
            .await?
            .ok_or_else(|| {
                PipelineError::missing(format!("upload {} has no frames", data_file.id))
            })?;

        self.render_heatmap(frame).await
    }

    async fn render_heatmap(&self, frame: PressureFrame) -> Result<Heatmap> {
        let config = self.config();

        let data_file = self
            .db
            .get_data_file(&frame.data_file_id)
            .await?
            .ok_or_else(|| {
                PipelineError::missing(format!("upload {} not found", frame.data_file_id))
            })?;

        let matrix = {
            let text = load_session_text(Path::new(&data_file.file_path), &config)?;
            let reader = SessionReader::new(&text, &config, data_file.uploaded_at)?;
            let index = usize::try_from(frame.frame_index).map_err(|_| {
                PipelineError::range(format!("frame index {} too large", frame.frame_index))
            })?;
            reader.frame(index)?.matrix
        };
        let metrics = FrameMetrics::compute(&matrix, &config);

        // View-time decision; the store keeps it only if the frame has not
        // been evaluated yet.
        let pending_alerts = (config.alert_generation == AlertGeneration::OnFirstView).then(|| {
            let refs = SessionRefs::new(data_file.subject_id.clone(), data_file.id.clone());
            evaluate_alert(
                frame.frame_index as usize,
                frame.captured_at,
                metrics.peak_pressure,
                &refs,
                &config,
                true,
            )
            .map(|event| {
                Alert::from_event(
                    Uuid::new_v4().to_string(),
                    Some(data_file.id.clone()),
                    Some(frame.id.clone()),
                    &event,
                )
            })
            .into_iter()
            .collect::<Vec<Alert>>()
        });

        let view = self
            .db
            .record_frame_view(&frame.id, Utc::now(), pending_alerts)
            .await?;
        log_debug!(
            "rendered frame {} (first view: {}, alerts stored: {})",
            frame.id,
            view.first_view,
            view.alerts.len()
        );
        if !view.alerts.is_empty() {
            log_info!(
                "raised {} alert(s) on view of frame {}",
                view.alerts.len(),
                frame.id
            );
        }

        Ok(Heatmap {
            frame_id: frame.id,
            data_file_id: data_file.id,
            subject_id: data_file.subject_id,
            frame_index: frame.frame_index,
            timestamp: frame.captured_at,
            metrics,
            values: matrix,
            new_alerts: view.alerts,
        })
    }
}
