use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facesort_core::clustering::domain::clustering_engine::DEFAULT_TOLERANCE;
use facesort_core::clustering::domain::distance::Metric;
use facesort_core::shared::constants::APP_DIR_NAME;

/// Persisted defaults; command-line flags override them per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default)]
    pub detector_model_path: Option<PathBuf>,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_metric() -> String {
    Metric::default().to_string()
}

fn default_progress_every() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            metric: default_metric(),
            model_path: None,
            detector_model_path: None,
            progress_every: default_progress_every(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads from the user config dir; missing or unreadable files yield defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
