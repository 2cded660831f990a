//! # System Constants
//!
//! Wire-format and configuration constants shared across the engine.

/// Separator between the main state and secondary states in a stored status
pub const STATUS_DELIMITER: &str = ";";

/// Configuration file read by `ConfigManager::load` when present
pub const DEFAULT_CONFIG_FILE: &str = "config/calc-flow.toml";

/// Environment variables override configuration as `CALC_FLOW__<SECTION>__<KEY>`
pub const CONFIG_ENV_PREFIX: &str = "CALC_FLOW";
pub const CONFIG_ENV_SEPARATOR: &str = "__";

/// Default configuration values
pub mod defaults {
    pub const LIFECYCLE_TIMEOUT_MS: u64 = 30_000;
    pub const COMMAND_BUFFER_SIZE: usize = 64;
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;
    pub const DATABASE_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
    pub const LOG_LEVEL: &str = "info";
}

/// Names of the bundled workflows
pub mod workflows {
    pub const CASH_FLOW: &str = "cash_flow";
    pub const VSSDV: &str = "vssdv";

    pub const ERROR_STATE: &str = "ERROR";
    pub const ERROR_EVENT: &str = "ERROR";
}
