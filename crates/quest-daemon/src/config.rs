//! Configuration file management.

use std::path::PathBuf;

use quest_scoring::{ProfileKind, ScoringProfile};
use quest_types::reaction::VoteWeight;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "QUEST_DATA_DIR";

/// Errors in an otherwise well-formed configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown vote_weight mode '{0}'")]
    UnknownVoteWeight(String),

    #[error("vote_weight_value {value} out of range for mode '{mode}'")]
    VoteWeightValue { mode: String, value: i64 },

    #[error(transparent)]
    Profile(#[from] quest_scoring::ScoringError),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Reaction settings.
    #[serde(default)]
    pub reactions: ReactionsConfig,
    /// Overdue sweep settings.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// "non_negative" | "signed" | "signed_conservative".
    #[serde(default)]
    pub profile: ProfileKind,
    /// Factor-extraction program. Empty = no factor source, always fall back.
    #[serde(default)]
    pub factor_command: String,
    /// Extra arguments passed to `factor_command`.
    #[serde(default)]
    pub factor_args: Vec<String>,
    #[serde(default = "default_factor_timeout_ms")]
    pub factor_timeout_ms: u64,
}

/// Reaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionsConfig {
    /// "disabled" | "fixed" | "xp_percent".
    #[serde(default = "default_vote_weight")]
    pub vote_weight: String,
    /// Points per vote ("fixed") or percent of the entry ("xp_percent").
    #[serde(default)]
    pub vote_weight_value: i64,
    #[serde(default = "default_throttle_max_changes")]
    pub throttle_max_changes: usize,
    #[serde(default = "default_throttle_window_ms")]
    pub throttle_window_ms: u64,
}

/// Overdue sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_factor_timeout_ms() -> u64 {
    8_000
}

fn default_vote_weight() -> String {
    "disabled".to_string()
}

fn default_throttle_max_changes() -> usize {
    quest_reactions::throttle::DEFAULT_MAX_CHANGES
}

fn default_throttle_window_ms() -> u64 {
    quest_reactions::throttle::DEFAULT_WINDOW_MS
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            factor_command: String::new(),
            factor_args: Vec::new(),
            factor_timeout_ms: default_factor_timeout_ms(),
        }
    }
}

impl Default for ReactionsConfig {
    fn default() -> Self {
        Self {
            vote_weight: default_vote_weight(),
            vote_weight_value: 0,
            throttle_max_changes: default_throttle_max_changes(),
            throttle_window_ms: default_throttle_window_ms(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ScoringConfig {
    /// The validated scoring profile this configuration selects.
    pub fn profile(&self) -> Result<ScoringProfile, ConfigError> {
        let profile = self.profile.profile();
        profile.validate()?;
        Ok(profile)
    }
}

impl ReactionsConfig {
    /// Decode `vote_weight` and `vote_weight_value`.
    pub fn vote_weight(&self) -> Result<VoteWeight, ConfigError> {
        let value = self.vote_weight_value;
        let out_of_range = || ConfigError::VoteWeightValue {
            mode: self.vote_weight.clone(),
            value,
        };
        match self.vote_weight.as_str() {
            "disabled" => Ok(VoteWeight::Disabled),
            "fixed" if value >= 0 => Ok(VoteWeight::Fixed(value)),
            "xp_percent" => u8::try_from(value)
                .ok()
                .filter(|pct| *pct <= 100)
                .map(VoteWeight::XpPercent)
                .ok_or_else(out_of_range),
            "fixed" => Err(out_of_range()),
            other => Err(ConfigError::UnknownVoteWeight(other.to_string())),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Quest")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".quest")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/quest"))
}
