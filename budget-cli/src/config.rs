//! Optional TOML configuration for the `budget-calc` binary.
//!
//! ```toml
//! [logging]
//! level = "info"
//! file = "budget-calc.log"
//!
//! [defaults]
//! overhead_rate = 26
//! target_enrollment = 40
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use budget_core::BudgetDefaults;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// File looked for in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "budget-calc.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("defaults.overhead_rate must be between 0 and 100, got {0}")]
    OverheadOutOfRange(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level or `EnvFilter` directive.
    pub level: Option<String>,
    /// Append log records to this file as well as stderr.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub logging: LoggingConfig,
    pub defaults: BudgetDefaults,
}

impl CliConfig {
    /// Loads the config file.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "loading config");
                Self::from_toml_str(&text)
            }
            Err(e) if !required && e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let rate = self.defaults.overhead_rate;
        if !(0.0..=100.0).contains(&rate) {
            return Err(ConfigError::OverheadOutOfRange(rate));
        }
        Ok(())
    }
}
