//! PostgreSQL-backed calculation registry over the `calculation` table

use super::status_store::parse_machine_id;
use crate::registry::{Calculation, CalculationRegistry};
use crate::state_machine::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct CalculationRow {
    uid: Uuid,
    name: String,
    description: Option<String>,
    #[sqlx(rename = "type")]
    calculation_type: String,
    created_date: DateTime<Utc>,
    modified_date: DateTime<Utc>,
}

impl CalculationRow {
    fn into_calculation(self) -> PersistenceResult<Calculation> {
        let calculation_type =
            self.calculation_type
                .parse()
                .map_err(|_| PersistenceError::ReadFailed {
                    machine_id: self.uid.to_string(),
                    reason: format!("unknown calculation type {}", self.calculation_type),
                })?;

        Ok(Calculation {
            uid: self.uid,
            name: self.name,
            description: self.description,
            calculation_type,
            created_at: self.created_date,
            modified_at: self.modified_date,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgCalculationRegistry {
    pool: PgPool,
}

impl PgCalculationRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a calculation, returning its machine id
    pub async fn create(&self, calculation: &Calculation) -> PersistenceResult<String> {
        sqlx::query(
            r#"
            INSERT INTO calculation (uid, name, description, type, created_date, modified_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(calculation.uid)
        .bind(&calculation.name)
        .bind(&calculation.description)
        .bind(calculation.calculation_type.as_str())
        .bind(calculation.created_at)
        .bind(calculation.modified_at)
        .execute(&self.pool)
        .await?;

        debug!(machine_id = %calculation.uid, name = %calculation.name, "Calculation created");
        Ok(calculation.machine_id())
    }

    pub async fn find(&self, machine_id: &str) -> PersistenceResult<Option<Calculation>> {
        let uid = parse_machine_id(machine_id)?;

        sqlx::query_as::<_, CalculationRow>(
            r#"
            SELECT uid, name, description, type, created_date, modified_date
            FROM calculation
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?
        .map(CalculationRow::into_calculation)
        .transpose()
    }
}

#[async_trait]
impl CalculationRegistry for PgCalculationRegistry {
    async fn resolve(&self, machine_id: &str) -> PersistenceResult<bool> {
        // ids that are not UUIDs can never name a calculation
        let Ok(uid) = Uuid::parse_str(machine_id) else {
            return Ok(false);
        };

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM calculation WHERE uid = $1)")
                .bind(uid)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
