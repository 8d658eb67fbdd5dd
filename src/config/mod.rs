use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::countdown::TICK_PERIOD;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Optional hex colour overrides (`#RRGGBB` or `#RGB`)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_dim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactive: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Duration (seconds) pre-filled into the input field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u64>,

    /// Tick period in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Desktop notification when the countdown finishes
    #[serde(default = "default_true")]
    pub notifications: bool,

    #[serde(default)]
    pub theme: ThemeConfig,
}

fn default_tick_millis() -> u64 {
    TICK_PERIOD.as_millis() as u64
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_duration: None,
            tick_millis: default_tick_millis(),
            notifications: true,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("countdown");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default location, or create it
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                AppConfig::default()
            }
        }
    }

    /// Load config from `path`. A missing file is created with defaults;
    /// an unreadable or invalid one falls back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match Self::read(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config {}: {}", path.display(), e);
                    return AppConfig::default();
                }
            }
        }

        let config = AppConfig::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        config
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        // Zero durations are the same as none
        let mut clean_config = self.clone();
        clean_config.default_duration = clean_config.default_duration.filter(|d| *d > 0);

        let content = toml::to_string_pretty(&clean_config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Tick period, never shorter than 10ms
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_millis.max(10))
    }
}
