//! Configuration management for rtmpkit.
//!
//! This module provides the configuration consumed by the plugin host and the
//! command-line tool:
//! - Loading from YAML files
//! - Environment variable overrides (`RTMPKIT__SECTION__FIELD`)
//! - Plugin search directories derived from the process environment
//! - Validation of all settings

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Per-user plugin directory, relative to the home directory.
pub const USER_PLUGIN_SUBDIR: &str = ".rtmpkit/plugins";

/// Environment variable naming an additional plugin directory.
pub const EXTRA_PLUGIN_DIR_ENV: &str = "RTMPKIT_PLUGINDIR";

/// Environment variable holding the user's home directory.
#[cfg(windows)]
pub const HOME_ENV: &str = "USERPROFILE";
/// Environment variable holding the user's home directory.
#[cfg(not(windows))]
pub const HOME_ENV: &str = "HOME";

/// System plugin directory, fixed at build time.
pub const SYSTEM_PLUGIN_DIR: &str = match option_env!("RTMPKIT_SYSTEM_PLUGINDIR") {
    Some(dir) => dir,
    None => "/usr/local/lib/rtmpkit/plugins",
};

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use rtmpkit_core::config::AppConfig;
///
/// let config = AppConfig::from_file("rtmpkit.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin discovery settings
    #[serde(default)]
    pub plugins: PluginConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering `RTMPKIT__*`
    /// environment variables over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("RTMPKIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<()> {
        self.plugins.validate()?;
        self.logging.parse_level()?;
        Ok(())
    }
}

/// Where and how plugin modules are discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Per-user override directory, scanned first
    #[serde(default = "default_user_dir")]
    pub user_dir: Option<PathBuf>,

    /// Extra directory, scanned between the user and system directories
    #[serde(default = "default_extra_dir")]
    pub extra_dir: Option<PathBuf>,

    /// System directory, scanned last
    #[serde(default = "default_system_dir")]
    pub system_dir: PathBuf,

    /// File name suffix of loadable modules, leading dot included
    #[serde(default = "default_module_suffix")]
    pub module_suffix: String,
}

fn default_user_dir() -> Option<PathBuf> {
    user_dir_from(std::env::var_os(HOME_ENV))
}

fn default_extra_dir() -> Option<PathBuf> {
    std::env::var_os(EXTRA_PLUGIN_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

fn default_system_dir() -> PathBuf {
    PathBuf::from(SYSTEM_PLUGIN_DIR)
}

fn default_module_suffix() -> String {
    std::env::consts::DLL_SUFFIX.to_string()
}

fn user_dir_from(home: Option<OsString>) -> Option<PathBuf> {
    home.filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(USER_PLUGIN_SUBDIR))
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PluginConfig {
    /// Builds the plugin configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            user_dir: default_user_dir(),
            extra_dir: default_extra_dir(),
            system_dir: default_system_dir(),
            module_suffix: default_module_suffix(),
        }
    }

    /// Builds a configuration that scans only the given directories, in order
    /// user, system. No environment lookups are made.
    pub fn with_dirs(user_dir: Option<PathBuf>, system_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_dir,
            extra_dir: None,
            system_dir: system_dir.into(),
            module_suffix: default_module_suffix(),
        }
    }

    /// Sets the home directory the user override directory is derived from.
    pub fn home(mut self, home: Option<impl Into<OsString>>) -> Self {
        self.user_dir = user_dir_from(home.map(Into::into));
        self
    }

    /// Directories to scan, in scan order.
    ///
    /// The extra directory is dropped when it names the system directory so
    /// that the same modules are not offered twice.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(3);
        if let Some(ref user) = self.user_dir {
            dirs.push(user.clone());
        }
        if let Some(ref extra) = self.extra_dir {
            if *extra != self.system_dir {
                dirs.push(extra.clone());
            }
        }
        dirs.push(self.system_dir.clone());
        dirs
    }

    /// Returns true if `file_name` names a loadable module.
    pub fn is_module_file(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.module_suffix)
    }

    /// Validates the plugin settings.
    pub fn validate(&self) -> Result<()> {
        if self.module_suffix.is_empty() {
            return Err(
                ConfigError::invalid_value("plugins.module_suffix", "must not be empty").into(),
            );
        }
        if self.system_dir.as_os_str().is_empty() {
            return Err(
                ConfigError::invalid_value("plugins.system_dir", "must not be empty").into(),
            );
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}
