//! Configuration for levelgrid
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file still yields a usable configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub probing: ProbingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial connection to the controlled device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0")
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read timeout; bounds how long the reader takes to notice shutdown
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Probe session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbingConfig {
    /// Seconds to wait for each probe report
    #[serde(default = "default_response_timeout")]
    pub response_timeout: f64,
    /// Answer probe requests locally with a fixed report (no hardware needed).
    /// Never enable on a real device.
    #[serde(default)]
    pub debug: bool,
}

/// Profile persistence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_profiles_path")]
    pub profiles_path: String,
}

/// Operators allowed to issue commands (empty: everyone)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub operators: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    115200
}
fn default_read_timeout_ms() -> u64 {
    200
}
fn default_response_timeout() -> f64 {
    20.0
}
fn default_profiles_path() -> String {
    "profiles.toml".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            response_timeout: default_response_timeout(),
            debug: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profiles_path: default_profiles_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ProbingConfig {
    /// Response timeout as a duration
    pub fn timeout(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.response_timeout).map_err(|_| {
            Error::Config(format!(
                "response_timeout must be a non-negative number of seconds, got {}",
                self.response_timeout
            ))
        })
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::info!("No config at {:?}, using defaults", path.as_ref());
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
