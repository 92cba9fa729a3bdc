use anyhow::Result;

use crate::analysis::{downsample, TrendPoint};

use super::PressureService;

impl PressureService {
    /// Recent frames for a subject, oldest first, thinned to at most
    /// `max_points` (the configured default when `None`).
    pub async fn subject_trend(
        &self,
        subject_id: &str,
        max_points: Option<usize>,
    ) -> Result<Vec<TrendPoint>> {
        let config = self.config();
        let frames = self
            .db
            .recent_frames_for_subject(subject_id, config.trend_window_frames)
            .await?;

        let points: Vec<TrendPoint> = frames.iter().map(|f| f.trend_point()).collect();
        Ok(downsample(
            &points,
            max_points.unwrap_or(config.trend_max_points),
        ))
    }
}
