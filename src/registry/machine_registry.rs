//! # Machine Registry
//!
//! Owns every live [`MachineInstance`] in the process, keyed by machine id.
//!
//! ## Guarantees
//!
//! - **One instance per id**: insertion goes through a single `DashMap` entry, so
//!   concurrent acquires of the same id share one instance
//! - **Restore once**: a freshly created instance is restored from the status store
//!   before its first start; a failed restore evicts it
//! - **Release before stop**: an instance leaves the map before it is stopped, so no new
//!   caller can acquire a stopping machine
//! - **Released is final**: a caller that looked up an instance just before it was
//!   released retries with a fresh entry instead of restarting the released one
//!
//! ## Usage
//!
//! ```rust,no_run
//! use calc_flow::config::EngineConfig;
//! use calc_flow::registry::{InMemoryCalculationRegistry, MachineRegistry};
//! use calc_flow::state_machine::InMemoryStatusStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MachineRegistry::new(
//!     Arc::new(InMemoryStatusStore::new()),
//!     Arc::new(InMemoryCalculationRegistry::new()),
//!     EngineConfig::default(),
//! )?;
//!
//! let machine = registry.acquire("cash_flow", "7f1c0d2e-0000-0000-0000-000000000001").await?;
//! machine.send("DATA_PREPARED").await?;
//! registry.release(machine.machine_id()).await?;
//! # Ok(())
//! # }
//! ```

use super::calculation_registry::CalculationRegistry;
use crate::config::EngineConfig;
use crate::logging::log_machine_operation;
use crate::state_machine::{
    MachineInstance, StateMachineError, StateMachineResult, StatusPersister, StatusStore,
    WorkflowDefinition,
};
use crate::workflows::CalculationType;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_machines: usize,
    pub running_machines: usize,
}

pub struct MachineRegistry {
    machines: DashMap<String, Arc<MachineInstance>>,
    definitions: HashMap<CalculationType, Arc<WorkflowDefinition>>,
    persister: StatusPersister,
    calculations: Arc<dyn CalculationRegistry>,
    config: EngineConfig,
}

impl std::fmt::Debug for MachineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineRegistry")
            .field("machines", &self.machines.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MachineRegistry {
    /// Build the registry and validate every bundled workflow definition
    pub fn new(
        store: Arc<dyn StatusStore>,
        calculations: Arc<dyn CalculationRegistry>,
        config: EngineConfig,
    ) -> StateMachineResult<Self> {
        let definitions = CalculationType::ALL
            .into_iter()
            .map(|calculation_type| {
                calculation_type
                    .definition()
                    .map(|definition| (calculation_type, Arc::new(definition)))
            })
            .collect::<StateMachineResult<HashMap<_, _>>>()?;

        info!(
            workflows = definitions.len(),
            lifecycle_timeout_ms = config.lifecycle_timeout_ms,
            "Machine registry created"
        );

        Ok(Self {
            machines: DashMap::new(),
            definitions,
            persister: StatusPersister::new(store),
            calculations,
            config,
        })
    }

    /// Get the running machine for `machine_id`, creating, restoring and starting it
    /// when needed
    pub async fn acquire(
        &self,
        machine_type: &str,
        machine_id: &str,
    ) -> StateMachineResult<Arc<MachineInstance>> {
        let calculation_type: CalculationType = machine_type.parse()?;
        let definition = self
            .definitions
            .get(&calculation_type)
            .cloned()
            .ok_or_else(|| StateMachineError::UnknownMachineType {
                machine_type: machine_type.to_string(),
            })?;

        if !self.calculations.resolve(machine_id).await? {
            return Err(StateMachineError::UnknownCalculation {
                machine_id: machine_id.to_string(),
            });
        }

        loop {
            let instance = self
                .machines
                .entry(machine_id.to_string())
                .or_insert_with(|| {
                    debug!(
                        machine_id = %machine_id,
                        calculation_type = %calculation_type,
                        "Creating machine instance"
                    );
                    Arc::new(MachineInstance::new(
                        machine_id,
                        definition.clone(),
                        self.persister.clone(),
                        self.config.clone(),
                    ))
                })
                .value()
                .clone();

            if instance.definition().name() != calculation_type.as_str() {
                return Err(StateMachineError::MachineTypeMismatch {
                    machine_id: machine_id.to_string(),
                    expected: calculation_type.to_string(),
                    actual: instance.definition().name().to_string(),
                });
            }

            match instance.activate().await {
                Ok(()) => {
                    log_machine_operation(
                        "acquire",
                        machine_id,
                        calculation_type.as_str(),
                        "running",
                        None,
                    );
                    return Ok(instance);
                }
                // released between lookup and activation; the next entry is a new instance
                Err(StateMachineError::MachineReleased { .. }) => {
                    debug!(machine_id = %machine_id, "Acquired instance was released, retrying");
                    self.evict(machine_id, &instance);
                }
                Err(err) => {
                    warn!(
                        machine_id = %machine_id,
                        calculation_type = %calculation_type,
                        error = %err,
                        "Failed to activate machine, evicting"
                    );
                    self.evict(machine_id, &instance);
                    return Err(err);
                }
            }
        }
    }

    /// Drop `instance` from the map unless the entry already holds a newer one
    fn evict(&self, machine_id: &str, instance: &Arc<MachineInstance>) {
        self.machines
            .remove_if(machine_id, |_, existing| Arc::ptr_eq(existing, instance));
    }

    /// Remove the machine and stop it for good. Unknown ids are ignored.
    pub async fn release(&self, machine_id: &str) -> StateMachineResult<()> {
        let Some((_, instance)) = self.machines.remove(machine_id) else {
            debug!(machine_id = %machine_id, "Release of unknown machine ignored");
            return Ok(());
        };

        instance.release().await?;
        log_machine_operation(
            "release",
            machine_id,
            instance.definition().name(),
            "released",
            None,
        );
        Ok(())
    }

    /// Release every registered machine, returning the first failure
    pub async fn shutdown(&self) -> StateMachineResult<()> {
        let machine_ids = self.machine_ids();
        info!(machines = machine_ids.len(), "Shutting down machine registry");

        let results = join_all(machine_ids.iter().map(|id| self.release(id))).await;

        let mut first_error = None;
        for (machine_id, result) in machine_ids.iter().zip(results) {
            if let Err(err) = result {
                warn!(machine_id = %machine_id, error = %err, "Failed to release machine during shutdown");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Live instance for `machine_id`, without creating one
    pub fn get(&self, machine_id: &str) -> Option<Arc<MachineInstance>> {
        self.machines.get(machine_id).map(|entry| entry.value().clone())
    }

    pub fn machine_ids(&self) -> Vec<String> {
        self.machines.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn definition(&self, calculation_type: CalculationType) -> Option<&Arc<WorkflowDefinition>> {
        self.definitions.get(&calculation_type)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_machines: self.machines.len(),
            running_machines: self
                .machines
                .iter()
                .filter(|entry| entry.value().is_running())
                .count(),
        }
    }
}
