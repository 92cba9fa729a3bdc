use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::analysis::{AlertGeneration, AnalysisConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    #[serde(default)]
    analysis: AnalysisConfig,
}

/// Partial update applied by `settings set`.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOverrides {
    pub alert_threshold: Option<u32>,
    pub critical_threshold: Option<u32>,
    pub activation_threshold: Option<u32>,
    pub alert_generation: Option<AlertGeneration>,
    pub trend_max_points: Option<usize>,
}

impl AnalysisOverrides {
    pub fn is_empty(&self) -> bool {
        self.alert_threshold.is_none()
            && self.critical_threshold.is_none()
            && self.activation_threshold.is_none()
            && self.alert_generation.is_none()
            && self.trend_max_points.is_none()
    }

    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(value) = self.alert_threshold {
            config.alert_threshold = value;
        }
        if let Some(value) = self.critical_threshold {
            config.critical_threshold = value;
        }
        if let Some(value) = self.activation_threshold {
            config.activation_threshold = value;
        }
        if let Some(value) = self.alert_generation {
            config.alert_generation = value;
        }
        if let Some(value) = self.trend_max_points {
            config.trend_max_points = value;
        }
    }
}

/// Analysis thresholds persisted as JSON next to the database.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let data: StoredSettings = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
            data.analysis
                .validate()
                .with_context(|| format!("Invalid analysis settings in {}", path.display()))?;
            data
        } else {
            StoredSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.read().analysis.clone()
    }

    /// Apply overrides, validate and persist. Leaves the stored settings
    /// untouched when validation fails.
    pub fn update_analysis(&self, overrides: &AnalysisOverrides) -> Result<AnalysisConfig> {
        let mut guard = self.write();

        let mut next = guard.analysis.clone();
        overrides.apply(&mut next);
        next.validate().context("Rejected analysis settings")?;

        let updated = StoredSettings {
            analysis: next.clone(),
        };
        self.persist(&updated)?;
        *guard = updated;

        Ok(next)
    }

    fn persist(&self, data: &StoredSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
