//! # Database Migrations
//!
//! Schema for the calculation registry and status log, embedded from `migrations/`
//! at compile time.

use crate::state_machine::PersistenceResult;
use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration
pub async fn run_migrations(pool: &PgPool) -> PersistenceResult<()> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.iter().count(), "Database migrations applied");
    Ok(())
}
