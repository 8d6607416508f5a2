//! Configuration management for teamlog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::{IdentityDigest, InputClassifier};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "teamlog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "teamlog.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "TEAMLOG_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TEAMLOG_`, sections split by `__`)
/// 2. TOML config file at `~/.config/teamlog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Identity hashing and resolver configuration.
    pub identity: IdentityConfig,
    /// Attendance policy configuration.
    pub attendance: AttendanceConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/teamlog/teamlog.db`
    pub database_path: Option<PathBuf>,
}

/// Identity-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Digest used to hash external identifiers.
    pub digest: IdentityDigest,
    /// Regex deciding which resolver input is a raw identifier.
    /// When unset, any all-digit input is an identifier.
    pub numeric_pattern: Option<String>,
}

/// What to do when a member is checked in while already checked in
/// (or checked out while already checked out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// Re-stamp `last_updated` and append another event.
    #[default]
    Record,
    /// Leave the member and the history untouched.
    Ignore,
}

/// Attendance-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Behavior of a transition into the state the member is already in.
    pub repeat_check_in: RepeatPolicy,
    /// Check a member out when they are deactivated while checked in.
    pub deactivate_checks_out: bool,
    /// Default number of history entries to show.
    pub history_limit: usize,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            repeat_check_in: RepeatPolicy::Record,
            deactivate_checks_out: false,
            history_limit: 20,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.attendance.history_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "history_limit must be greater than 0".to_string(),
            });
        }

        self.input_classifier()?;
        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Build the resolver input classifier described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `numeric_pattern` is not a valid regex.
    pub fn input_classifier(&self) -> Result<InputClassifier> {
        match &self.identity.numeric_pattern {
            Some(pattern) => InputClassifier::with_pattern(pattern),
            None => Ok(InputClassifier::default()),
        }
    }
}
