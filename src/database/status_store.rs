//! PostgreSQL status log: one `calculation_status` row per persisted step, linked to
//! the calculation whose `uid` is the machine id.

use crate::logging::log_store_operation;
use crate::state_machine::{PersistenceError, PersistenceResult, StatusSnapshot, StatusStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct StatusRow {
    status: String,
    created_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn parse_machine_id(machine_id: &str) -> PersistenceResult<Uuid> {
    Uuid::parse_str(machine_id).map_err(|_| PersistenceError::InvalidMachineId {
        machine_id: machine_id.to_string(),
    })
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn append(&self, machine_id: &str, snapshot: &StatusSnapshot) -> PersistenceResult<()> {
        let uid = parse_machine_id(machine_id)?;
        let status = snapshot.status();

        let result = sqlx::query(
            r#"
            INSERT INTO calculation_status (calculation_id, status, created_date)
            SELECT id, $2, $3 FROM calculation WHERE uid = $1
            "#,
        )
        .bind(uid)
        .bind(&status)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::AppendFailed {
            reason: format!("Failed to insert status for {machine_id}: {e}"),
        });

        let result = match result {
            Ok(done) if done.rows_affected() == 0 => Err(PersistenceError::CalculationNotFound {
                machine_id: machine_id.to_string(),
            }),
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };

        log_store_operation(
            "append",
            machine_id,
            Some(&status),
            result.is_ok(),
            result.as_ref().err().map(ToString::to_string).as_deref(),
        );
        result
    }

    async fn latest(&self, machine_id: &str) -> PersistenceResult<Option<StatusSnapshot>> {
        let uid = parse_machine_id(machine_id)?;

        let row = sqlx::query_as::<_, StatusRow>(
            r#"
            SELECT cs.status, cs.created_date
            FROM calculation_status cs
            JOIN calculation c ON c.id = cs.calculation_id
            WHERE c.uid = $1
            ORDER BY cs.created_date DESC, cs.id DESC
            LIMIT 1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::ReadFailed {
            machine_id: machine_id.to_string(),
            reason: e.to_string(),
        })?;

        log_store_operation(
            "latest",
            machine_id,
            row.as_ref().map(|row| row.status.as_str()),
            true,
            None,
        );

        row.map(|row| StatusSnapshot::from_status(machine_id, &row.status, row.created_date))
            .transpose()
    }
}
