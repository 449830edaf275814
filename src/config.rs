//! Application configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables prefixed with `OLIVE_`, nested keys separated by
//!    `__` (e.g. `OLIVE_SESSION__ACQUISITION__DEFAULT_FRAME_COUNT=32`)
//!
//! # Example
//! ```no_run
//! use olive::config::OliveConfig;
//!
//! let config = OliveConfig::load_from("olive.toml")?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), figment::Error>(())
//! ```

use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use olive_core::{HalError, HalResult, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/olive.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OliveConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Session behaviour shared by every opened device
    #[serde(default)]
    pub session: SessionConfig,
    /// Simulated devices, passed to the mock driver as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock: Option<toml::Value>,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log line layout (pretty, compact, json)
    #[serde(default)]
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

fn default_name() -> String {
    "olive".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl OliveConfig {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// The provider stack used by [`load_from`](Self::load_from).
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("OLIVE_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> HalResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(HalError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }
        if self.application.name.trim().is_empty() {
            return Err(HalError::Configuration(
                "application.name must not be empty".into(),
            ));
        }
        if let Some(mock) = &self.mock {
            if !mock.is_table() {
                return Err(HalError::Configuration(
                    "mock must be a table of device definitions".into(),
                ));
            }
        }
        self.session.validate()
    }

    /// Mock driver for the `[mock]` section, or the default device pair
    /// when the section is absent.
    #[cfg(feature = "mock")]
    pub fn mock_driver(&self) -> anyhow::Result<olive_driver_mock::MockDriver> {
        match &self.mock {
            Some(value) => olive_driver_mock::MockDriver::from_value(value.clone()),
            None => Ok(olive_driver_mock::MockDriver::default()),
        }
    }
}
