use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backup::BackupSettings;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Hours a done task stays on the board before the sweep archives it
pub const DEFAULT_AUTO_ARCHIVE_DELAY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Negative disables auto-archiving
    #[serde(default = "default_auto_archive_delay_hours")]
    pub auto_archive_delay_hours: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            auto_archive_delay_hours: default_auto_archive_delay_hours(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    data_file_for_profile(utils::Profile::Prod, "app.db")
}

fn default_auto_archive_delay_hours() -> i64 {
    DEFAULT_AUTO_ARCHIVE_DELAY_HOURS
}

fn default_log_level() -> String {
    if cfg!(debug_assertions) {
        "debug".to_string()
    } else {
        "info".to_string()
    }
}

fn default_log_dir() -> String {
    data_file_for_profile(utils::Profile::Prod, "logs")
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

fn data_file_for_profile(profile: utils::Profile, name: &str) -> String {
    if let Some(data_dir) = utils::get_data_dir(profile) {
        data_dir.join(name).to_string_lossy().to_string()
    } else {
        let app_dir = match profile {
            utils::Profile::Dev => "grid-dev",
            utils::Profile::Prod => "grid",
        };
        format!("~/.local/share/{app_dir}/{name}")
    }
}

/// Where the configuration lives: the profile's default location or an
/// explicit file given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Profile(utils::Profile),
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from the profile's config file, creating it with
    /// defaults if missing. Data paths always follow the profile.
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let mut config = Self::load_from_path(&config_path)?;
            config.database_path = data_file_for_profile(profile, "app.db");
            config.log_dir = data_file_for_profile(profile, "logs");
            Ok(config)
        } else {
            let mut config = Config {
                database_path: data_file_for_profile(profile, "app.db"),
                log_dir: data_file_for_profile(profile, "logs"),
                ..Config::default()
            };
            config.save_to_path(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(source: &ConfigSource) -> Result<Self, ConfigError> {
        match source {
            ConfigSource::Profile(profile) => Self::load_with_profile(*profile),
            ConfigSource::File(path) if path.exists() => Self::load_from_path(path),
            ConfigSource::File(path) => {
                let mut config = Config::default();
                config.save_to_path(path)?;
                Ok(config)
            }
        }
    }

    pub fn save_to(&mut self, source: &ConfigSource) -> Result<(), ConfigError> {
        match source {
            ConfigSource::Profile(profile) => self.save_with_profile(*profile),
            ConfigSource::File(path) => self.save_to_path(path),
        }
    }

    /// Load configuration from an explicit file; missing keys take defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&mut self, path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn get_log_dir(&self) -> PathBuf {
        utils::expand_path(&self.log_dir)
    }

    /// `None` when auto-archiving is disabled
    pub fn auto_archive_delay(&self) -> Option<i64> {
        (self.auto_archive_delay_hours >= 0).then_some(self.auto_archive_delay_hours)
    }

    pub fn backup_settings(&self) -> BackupSettings {
        BackupSettings {
            auto_archive_delay: self.auto_archive_delay_hours,
        }
    }

    pub fn apply_backup_settings(&mut self, settings: BackupSettings) {
        self.auto_archive_delay_hours = settings.auto_archive_delay;
    }
}
