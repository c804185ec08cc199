// Wallet configuration
//
// Defaults, builder-style overrides, and environment loading with the
// CUSTODY_ prefix. Command-line flags are applied on top by the binary.

use crate::units::{DECIMALS, MAX_DECIMALS};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "CUSTODY_DATA_DIR";
pub const ENV_LOG: &str = "CUSTODY_LOG";
pub const ENV_DECIMALS: &str = "CUSTODY_DECIMALS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Directory of the sled database
    pub data_dir: PathBuf,
    /// tracing-subscriber EnvFilter directive
    pub log_filter: String,
    /// Fractional digits used when parsing and displaying amounts
    pub decimals: u8,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".custody"),
            log_filter: "warn,custody=info".to_string(),
            decimals: DECIMALS,
        }
    }
}

impl WalletConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from CUSTODY_* environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = env::var(ENV_LOG) {
            config.log_filter = filter;
        }
        if let Ok(value) = env::var(ENV_DECIMALS) {
            config.decimals = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_DECIMALS,
                value,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_log_filter(mut self, filter: &str) -> Self {
        self.log_filter = filter.to_string();
        self
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "decimals must be <= {}, got {}",
                MAX_DECIMALS, self.decimals
            )));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter cannot be empty".to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir cannot be empty".to_string()));
        }
        Ok(())
    }
}
