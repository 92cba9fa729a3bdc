use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::{
    alerts::{evaluate_alert, AlertEvent, SessionRefs},
    config::AnalysisConfig,
    metrics::FrameMetrics,
};
use crate::error::PipelineResult;
use crate::frames::{Frame, SessionReader};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Metrics for one frame, ready for the caller to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub frame_index: usize,
    pub captured_at: DateTime<Utc>,
    pub metrics: FrameMetrics,
}

impl FrameRecord {
    pub fn from_frame(frame: &Frame, config: &AnalysisConfig) -> Self {
        Self {
            frame_index: frame.index,
            captured_at: frame.captured_at,
            metrics: FrameMetrics::compute(&frame.matrix, config),
        }
    }
}

/// Everything derived from one upload.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub frames: Vec<FrameRecord>,
    pub alerts: Vec<AlertEvent>,
}

impl IngestOutcome {
    pub fn peak_pressure(&self) -> u32 {
        self.frames
            .iter()
            .map(|f| f.metrics.peak_pressure)
            .max()
            .unwrap_or(0)
    }
}

/// Parse a session, score every frame and decide alerts.
///
/// All-or-nothing: the first malformed frame rejects the whole session
/// and no records are returned.
pub fn ingest_session(
    text: &str,
    base_time: DateTime<Utc>,
    refs: &SessionRefs,
    config: &AnalysisConfig,
    emit_alerts: bool,
) -> PipelineResult<IngestOutcome> {
    let reader = SessionReader::new(text, config, base_time).map_err(|err| {
        log_warn!("rejecting session {}: {err}", refs.session_ref);
        err
    })?;

    log_debug!(
        "session {}: {} rows, {} frames",
        refs.session_ref,
        reader.line_count(),
        reader.frame_count()
    );

    let mut outcome = IngestOutcome {
        frames: Vec::with_capacity(reader.frame_count()),
        alerts: Vec::new(),
    };

    for frame in reader.frames() {
        let frame = frame.map_err(|err| {
            log_warn!("rejecting session {}: {err}", refs.session_ref);
            err
        })?;

        let record = FrameRecord::from_frame(&frame, config);

        if let Some(alert) = evaluate_alert(
            record.frame_index,
            record.captured_at,
            record.metrics.peak_pressure,
            refs,
            config,
            emit_alerts,
        ) {
            outcome.alerts.push(alert);
        }

        outcome.frames.push(record);
    }

    log_info!(
        "session {} for subject {}: {} frames, {} alerts, peak {}",
        refs.session_ref,
        refs.subject_id,
        outcome.frames.len(),
        outcome.alerts.len(),
        outcome.peak_pressure()
    );

    Ok(outcome)
}
