use std::time::Duration;
use std::{fs, path::Path, path::PathBuf, sync::RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::harvest::calibration::DEFAULT_MARGIN_TICKS;
use crate::harvest::config::HarvestConfig;
use crate::harvest::types::ViewportRegion;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Application whose panel gets harvested.
    pub target_app: String,
    /// Term typed into the target's search field before harvesting.
    pub search_term: String,
    pub margin_ticks: i64,
    pub settle_delay_ms: u64,
    pub probe_settle_delay_ms: u64,
    pub recognition_timeout_secs: u64,
    pub max_interactions: Option<u32>,
    /// ocrs model files (rten format).
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            target_app: "WhatsApp".into(),
            search_term: String::new(),
            margin_ticks: DEFAULT_MARGIN_TICKS,
            settle_delay_ms: 800,
            probe_settle_delay_ms: 1500,
            recognition_timeout_secs: 30,
            max_interactions: None,
            detection_model: PathBuf::from("models/text-detection.rten"),
            recognition_model: PathBuf::from("models/text-recognition.rten"),
        }
    }
}

impl UserSettings {
    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            margin_ticks: self.margin_ticks,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            probe_settle_delay: Duration::from_millis(self.probe_settle_delay_ms),
            recognition_timeout: Duration::from_secs(self.recognition_timeout_secs),
            max_interactions: self.max_interactions,
            ..HarvestConfig::default()
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults (and writing
    /// them out) when the file is absent or unreadable.
    pub fn new(path: PathBuf) -> Result<Self> {
        let exists = path.exists();
        let data = if exists {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        let store = Self {
            path,
            data: RwLock::new(data),
        };
        if !exists {
            store.persist(&store.data.read().unwrap())?;
        }
        Ok(store)
    }

    pub fn current(&self) -> UserSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, settings: UserSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))
    }
}

/// Load the persisted viewport region record, if one exists.
///
/// The record is a single line of four comma-separated integers. Its
/// absence means the one-time region selection has not happened yet; the
/// caller decides how to surface that.
pub fn load_region(path: &Path) -> Result<Option<ViewportRegion>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read region record from {}", path.display()))?;
    let region = ViewportRegion::parse_record(&contents)
        .with_context(|| format!("bad region record in {}", path.display()))?;
    Ok(Some(region))
}

pub fn save_region(path: &Path, region: &ViewportRegion) -> Result<()> {
    fs::write(path, region.to_record())
        .with_context(|| format!("failed to write region record to {}", path.display()))
}
