//! Configuration using Figment
//!
//! Configuration is layered from:
//! 1. Built-in defaults ([`SweepConfig::default`])
//! 2. A TOML file (`config/sweep.toml` unless another path is given)
//! 3. Environment variables prefixed with `SWEEP_DAQ_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use sweep_daq::config::SweepConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // SWEEP_DAQ_DISPATCHER__MAX_WORKERS=4 overrides the file
//! let config = SweepConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use crate::dispatcher::default_workers;
use crate::error::{AppResult, SweepError};
use crate::experiment::RunnerConfig;
use crate::hardware::mock::{AxisConfig, GridConfig, RandomConfig};
use crate::logging::{parse_log_level, OutputFormat};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/sweep.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// `[application]`
    pub application: ApplicationConfig,
    /// `[dispatcher]`
    pub dispatcher: DispatcherConfig,
    /// `[runner]`
    pub runner: RunnerSection,
    /// `[logging]`
    pub logging: LoggingSection,
    /// Simulated devices used by the command line demo
    pub demo: DemoConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Sweep DAQ".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Dispatcher worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum concurrent instrument calls per phase
    pub max_workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: default_workers(),
        }
    }
}

/// Sweep pacing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Pause between steps in milliseconds (0 = none)
    pub step_delay_ms: u64,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// pretty, compact or json
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
        }
    }
}

/// Devices of the demo experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// X/Y positioner at coupling level 0
    pub grid: GridConfig,
    /// Linear stage at coupling level 1
    pub axis: AxisConfig,
    /// Random-valued detector
    pub meter: RandomConfig,
}

impl SweepConfig {
    /// Load configuration from config/sweep.toml and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file leaves the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(SweepConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SWEEP_DAQ_").split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        parse_log_level(&self.application.log_level).map_err(SweepError::Settings)?;
        self.logging
            .format
            .parse::<OutputFormat>()
            .map_err(SweepError::Settings)?;

        if self.dispatcher.max_workers == 0 {
            return Err(SweepError::Settings(
                "dispatcher.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Runner settings derived from the dispatcher and runner sections
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_workers: self.dispatcher.max_workers,
            step_delay: Some(Duration::from_millis(self.runner.step_delay_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.dispatcher.max_workers >= 1);
        assert_eq!(config.runner_config().step_delay, Some(Duration::ZERO));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(
            &path,
            r#"
[application]
log_level = "debug"

[dispatcher]
max_workers = 3

[demo.axis]
start = 1.0
stop = 5.0
points = 5
"#,
        )
        .unwrap();

        let config = SweepConfig::load_from(&path).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.application.name, "Sweep DAQ");
        assert_eq!(config.dispatcher.max_workers, 3);
        assert_eq!(config.demo.axis.points, 5);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SweepConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.runner, RunnerSection::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = SweepConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(SweepError::Settings(_))));

        let mut config = SweepConfig::default();
        config.dispatcher.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
