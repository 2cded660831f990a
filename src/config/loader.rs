//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `CALC_FLOW__*` environment
//! variables through the `config` crate, then validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::CalcFlowConfig;
use crate::constants::{CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR, DEFAULT_CONFIG_FILE};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded and validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: CalcFlowConfig,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from `config/calc-flow.toml` when present, then the environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        let source_file = default_path.exists().then_some(default_path);
        Self::build(source_file)
    }

    /// Load from an explicit TOML file, then the environment. The file must exist.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound { path });
        }
        Self::build(Some(path))
    }

    /// Wrap an already constructed configuration
    pub fn from_config(config: CalcFlowConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source_file: None,
        }))
    }

    fn build(source_file: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&CalcFlowConfig::default())?);

        if let Some(path) = &source_file {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator(CONFIG_ENV_SEPARATOR)
                .separator(CONFIG_ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: CalcFlowConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            source = %source_file
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "defaults".to_string()),
            lifecycle_timeout_ms = config.engine.lifecycle_timeout_ms,
            command_buffer_size = config.engine.command_buffer_size,
            database_configured = config.database.url.is_some(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_file,
        }))
    }

    pub fn config(&self) -> &CalcFlowConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}
