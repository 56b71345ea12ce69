//! Configuration for the Usage Nudge Agent.

use crate::classifier::InsightConfig;
use crate::core::reasoner::PatternThresholds;
use crate::intervention::friction::{
    FrictionSettings, DEFAULT_LAUNCH_COOLDOWN, DEFAULT_LOOKBACK, DEFAULT_RELAUNCH_DELAY,
    DEFAULT_TARGET_PACKAGES,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Duration of each aggregation window
    #[serde(with = "duration_serde")]
    pub window_duration: Duration,

    /// Period of the usage-stats poll
    #[serde(with = "duration_serde")]
    pub usage_poll_interval: Duration,

    /// Period of the launch-friction poll
    #[serde(with = "duration_millis_serde")]
    pub friction_poll_interval: Duration,

    /// How far back each friction poll looks
    #[serde(with = "duration_millis_serde")]
    pub friction_lookback: Duration,

    /// Minimum gap between friction actions for one app
    #[serde(with = "duration_millis_serde")]
    pub friction_launch_cooldown: Duration,

    /// Delay between terminating a target app and relaunching it
    #[serde(with = "duration_millis_serde")]
    pub relaunch_delay: Duration,

    pub nudge_cooldown_minutes: u64,

    /// Packages that receive launch friction
    pub friction_targets: BTreeSet<String>,

    pub thresholds: PatternThresholds,

    /// Whether the platform shim may draw nudges over other apps
    pub overlay_permitted: bool,

    /// Whether collection is currently paused
    pub paused: bool,

    /// Path for storing state and transparency logs
    pub data_path: PathBuf,

    /// Weights for the bundled model (built-in weights when absent)
    pub model_weights_path: Option<PathBuf>,

    /// Endpoint of a remote classifier, used instead of the bundled model
    pub remote_classifier_url: Option<String>,

    /// Text-insight service settings
    pub insight: Option<InsightConfig>,

    /// Package name to display label
    pub app_labels: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("usage-nudge-agent");

        Self {
            window_duration: Duration::from_secs(10),
            usage_poll_interval: Duration::from_secs(300), // 5 minutes
            friction_poll_interval: Duration::from_millis(100),
            friction_lookback: DEFAULT_LOOKBACK,
            friction_launch_cooldown: DEFAULT_LAUNCH_COOLDOWN,
            relaunch_delay: DEFAULT_RELAUNCH_DELAY,
            nudge_cooldown_minutes: 15,
            friction_targets: DEFAULT_TARGET_PACKAGES.iter().map(|p| p.to_string()).collect(),
            thresholds: PatternThresholds::default(),
            overlay_permitted: true,
            paused: false,
            data_path: data_dir,
            model_weights_path: None,
            remote_classifier_url: None,
            insight: None,
            app_labels: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("usage-nudge-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn nudge_cooldown(&self) -> Duration {
        Duration::from_secs(self.nudge_cooldown_minutes * 60)
    }

    /// Where transparency statistics are persisted.
    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency_stats.json")
    }

    pub fn friction_settings(&self) -> FrictionSettings {
        FrictionSettings {
            targets: self.friction_targets.clone(),
            lookback: self.friction_lookback,
            launch_cooldown: self.friction_launch_cooldown,
            relaunch_delay: self.relaunch_delay,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration, in whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration, in milliseconds.
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
