//! questfarm configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main questfarm configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which game account this instance drives
    pub account: AccountConfig,

    /// State machine timing
    pub farm: FarmConfig,

    /// Command channel
    pub channel: ChannelConfig,

    /// Status snapshot publishing
    pub status: StatusConfig,

    /// Pattern store
    pub patterns: PatternsConfig,

    /// Logging
    pub log: LogConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .questfarm.yml
        let local_config = PathBuf::from(".questfarm.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/questfarm/questfarm.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only `log.level`, before logging is set up
    ///
    /// Errors are ignored; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".questfarm.yml")];
                paths.extend(Self::user_config_path());
                paths
            }
        };

        candidates
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log.level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("questfarm").join("questfarm.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Directory holding this account's command and response files
    pub fn account_channel_dir(&self) -> PathBuf {
        self.channel.dir.join(&self.account.id)
    }

    /// Status snapshot file for this account
    pub fn status_path(&self) -> PathBuf {
        self.status
            .path
            .clone()
            .unwrap_or_else(|| self.account_channel_dir().join("status.json"))
    }

    /// Log file for this account
    pub fn log_file(&self) -> PathBuf {
        self.log.dir.join(format!("questfarm-{}.log", self.account.id))
    }
}

/// Account identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Account id, also the channel subdirectory name
    pub id: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
        }
    }
}

/// Farm state machine timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Budget per state before giving up (Killing gets twice this)
    #[serde(rename = "state-timeout-secs")]
    pub state_timeout_secs: f32,

    /// Stationary time in Pathfinding/Returning that counts as stuck
    #[serde(rename = "stuck-timeout-secs")]
    pub stuck_timeout_secs: f32,

    /// Stuck retries before resetting to Idle
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Interval between dialog clicks while a dialog is open
    #[serde(rename = "dialog-advance-secs")]
    pub dialog_advance_secs: f32,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            state_timeout_secs: 60.0,
            stuck_timeout_secs: 8.0,
            max_retries: 3,
            dialog_advance_secs: 1.0,
        }
    }
}

/// Command channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Root directory; each account gets a subdirectory
    pub dir: PathBuf,

    /// How often the instance checks for a command
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// How long a controller waits for a response
    #[serde(rename = "response-timeout-ms")]
    pub response_timeout_ms: u64,
}

impl ChannelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("channel"),
            poll_interval_ms: 500,
            response_timeout_ms: 2000,
        }
    }
}

/// Status snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Snapshot file; defaults to `<channel-dir>/<account>/status.json`
    pub path: Option<PathBuf>,

    /// Publish interval
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Age after which readers treat the snapshot as offline
    #[serde(rename = "freshness-secs")]
    pub freshness_secs: u64,
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_ms: 2000,
            freshness_secs: 30,
        }
    }
}

/// Pattern store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Store file, shared between instances
    pub path: PathBuf,

    /// How often a dirty store is written back
    #[serde(rename = "save-interval-secs")]
    pub save_interval_secs: u64,
}

impl PatternsConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("patterns.json"),
            save_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level name; overridden by --log-level
    pub level: Option<String>,

    /// Directory for per-account log files
    pub dir: PathBuf,

    /// Recent lines kept in memory for the `log` command
    #[serde(rename = "tail-lines")]
    pub tail_lines: usize,

    /// How long shutdown waits for the writer to drain
    #[serde(rename = "shutdown-timeout-ms")]
    pub shutdown_timeout_ms: u64,
}

impl LogConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            dir: data_dir().join("logs"),
            tail_lines: 200,
            shutdown_timeout_ms: 500,
        }
    }
}

/// XDG data directory (~/.local/share/questfarm on Linux)
fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("questfarm"))
        .unwrap_or_else(|| PathBuf::from(".questfarm"))
}
