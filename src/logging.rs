//! # Structured Logging Module
//!
//! Console logging through the tracing ecosystem. `RUST_LOG` wins over the configured
//! level when set; JSON output is available for log shippers.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Safe to call repeatedly, and tolerates a subscriber installed elsewhere.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

        let layer = if config.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Log structured data for machine lifecycle operations
pub fn log_machine_operation(
    operation: &str,
    machine_id: &str,
    workflow: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        machine_id = %machine_id,
        workflow = %workflow,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "MACHINE_OPERATION"
    );
}

/// Log structured data for status store operations
pub fn log_store_operation(
    operation: &str,
    machine_id: &str,
    status: Option<&str>,
    success: bool,
    error: Option<&str>,
) {
    if success {
        tracing::debug!(
            operation = %operation,
            machine_id = %machine_id,
            status = status,
            "STORE_OPERATION"
        );
    } else {
        tracing::warn!(
            operation = %operation,
            machine_id = %machine_id,
            status = status,
            error = error,
            "STORE_OPERATION failed"
        );
    }
}
