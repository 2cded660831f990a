//! # Calculation Registry
//!
//! Answers whether a machine id names a known calculation. The engine only ever asks
//! for existence; calculation metadata is managed elsewhere.

use crate::state_machine::PersistenceResult;
use crate::workflows::CalculationType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Existence check for calculations keyed by machine id
#[async_trait]
pub trait CalculationRegistry: Send + Sync {
    async fn resolve(&self, machine_id: &str) -> PersistenceResult<bool>;
}

/// A registered calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    pub uid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub calculation_type: CalculationType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Calculation {
    pub fn new(name: impl Into<String>, calculation_type: CalculationType) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            description: None,
            calculation_type,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Machine id of this calculation's state machine
    pub fn machine_id(&self) -> String {
        self.uid.to_string()
    }
}

/// Process-local calculation registry
#[derive(Debug, Default)]
pub struct InMemoryCalculationRegistry {
    calculations: RwLock<HashMap<String, Calculation>>,
}

impl InMemoryCalculationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculation, returning its machine id
    pub fn register(&self, calculation: Calculation) -> String {
        let machine_id = calculation.machine_id();
        self.calculations
            .write()
            .insert(machine_id.clone(), calculation);
        machine_id
    }

    pub fn get(&self, machine_id: &str) -> Option<Calculation> {
        self.calculations.read().get(machine_id).cloned()
    }
}

#[async_trait]
impl CalculationRegistry for InMemoryCalculationRegistry {
    async fn resolve(&self, machine_id: &str) -> PersistenceResult<bool> {
        Ok(self.calculations.read().contains_key(machine_id))
    }
}
