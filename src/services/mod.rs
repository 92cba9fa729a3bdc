//! Glue between the pure analysis code and the SQLite store: uploads,
//! heatmap views, trends and alert handling for one data directory.

pub mod alerts;
pub mod heatmap;
pub mod trend;
pub mod upload;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{analysis::AnalysisConfig, db::Database, settings::SettingsStore};

pub use alerts::AlertSummary;
pub use heatmap::Heatmap;
pub use upload::{UploadReceipt, UploadRequest};

const SESSIONS_DIR: &str = "sessions";

#[derive(Clone)]
pub struct PressureService {
    db: Database,
    settings: Arc<SettingsStore>,
    sessions_dir: PathBuf,
}

impl PressureService {
    pub fn new(db: Database, settings: Arc<SettingsStore>, data_dir: &Path) -> Self {
        Self {
            db,
            settings,
            sessions_dir: data_dir.join(SESSIONS_DIR),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Thresholds in effect right now. Read per call so a settings change
    /// applies to the next upload or view.
    pub fn config(&self) -> AnalysisConfig {
        self.settings.analysis()
    }
}
