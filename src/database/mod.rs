//! # Database Operations
//!
//! PostgreSQL adapters for the engine's consumed interfaces.
//!
//! ## Key Components
//!
//! - [`connection`] - Pool construction from `DatabaseConfig`
//! - [`migrations`] - Embedded schema migrations
//! - [`status_store`] - `StatusStore` over the `calculation_status` table
//! - [`calculation_registry`] - `CalculationRegistry` over the `calculation` table
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use calc_flow::config::ConfigManager;
//! use calc_flow::database::{run_migrations, DatabaseConnection, PgStatusStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let db = DatabaseConnection::new(&manager.config().database).await?;
//! run_migrations(db.pool()).await?;
//!
//! let store = PgStatusStore::new(db.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod calculation_registry;
pub mod connection;
pub mod migrations;
pub mod status_store;

pub use calculation_registry::PgCalculationRegistry;
pub use connection::DatabaseConnection;
pub use migrations::{run_migrations, MIGRATOR};
pub use status_store::PgStatusStore;
