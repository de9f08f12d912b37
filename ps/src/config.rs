//! Configuration for patternstore

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Success rate below which `prune` drops an established pattern
pub const DEFAULT_PRUNE_MIN_RATE: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the pattern store file
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,

    /// Default threshold for `prune`
    #[serde(rename = "prune-min-rate")]
    pub prune_min_rate: f64,
}

/// Default location shared with the questfarm instances
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questfarm")
        .join("patterns.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            prune_min_rate: DEFAULT_PRUNE_MIN_RATE,
        }
    }
}

impl Config {
    /// Load config from `path`, else the first default location that exists, else defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::read(config_path);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("patternstore").join("config.yml")),
            Some(PathBuf::from("patternstore.yml")),
        ];
        match default_paths.iter().flatten().find(|p| p.exists()) {
            Some(found) => Self::read(found),
            None => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content).context(format!("Failed to parse config file {}", path.display()))
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
