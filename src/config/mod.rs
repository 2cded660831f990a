//! # Calculation Engine Configuration
//!
//! Typed configuration for the engine, the PostgreSQL adapters and logging. Every key
//! has a default so an empty environment yields a working in-memory setup.
//!
//! ## Sources
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. Optional TOML file (`config/calc-flow.toml`, or an explicit path)
//! 3. Environment variables `CALC_FLOW__<SECTION>__<KEY>`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use calc_flow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let timeout = manager.config().engine.lifecycle_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcFlowConfig {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl CalcFlowConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = |field: &str, value: u64| {
            if value == 0 {
                Err(ConfigurationError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    context: "must be greater than zero".to_string(),
                })
            } else {
                Ok(())
            }
        };

        positive("engine.lifecycle_timeout_ms", self.engine.lifecycle_timeout_ms)?;
        positive(
            "engine.command_buffer_size",
            self.engine.command_buffer_size as u64,
        )?;
        positive(
            "database.max_connections",
            u64::from(self.database.max_connections),
        )?;
        positive(
            "database.acquire_timeout_ms",
            self.database.acquire_timeout_ms,
        )?;

        if let Some(url) = &self.database.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(ConfigurationError::InvalidValue {
                    field: "database.url".to_string(),
                    value: "[redacted]".to_string(),
                    context: "expected a postgres:// or postgresql:// URL".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Machine lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on waiting for a machine's started/stopped acknowledgement
    pub lifecycle_timeout_ms: u64,
    /// Capacity of each machine's command channel
    pub command_buffer_size: usize,
}

impl EngineConfig {
    pub fn lifecycle_timeout(&self) -> Duration {
        Duration::from_millis(self.lifecycle_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lifecycle_timeout_ms: defaults::LIFECYCLE_TIMEOUT_MS,
            command_buffer_size: defaults::COMMAND_BUFFER_SIZE,
        }
    }
}

/// PostgreSQL connection settings for the status log and calculation registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
            acquire_timeout_ms: defaults::DATABASE_ACQUIRE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json: false,
        }
    }
}
