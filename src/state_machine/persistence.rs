use super::composite::ActiveStateSet;
use super::definition::{TransitionStep, WorkflowDefinition};
use super::errors::{PersistenceResult, StateMachineResult};
use super::snapshot::StatusSnapshot;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Append-only log of status snapshots keyed by machine id
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Durably record a snapshot. Must not return before the write is durable.
    async fn append(&self, machine_id: &str, snapshot: &StatusSnapshot) -> PersistenceResult<()>;

    /// Most recently appended snapshot for the machine, if any
    async fn latest(&self, machine_id: &str) -> PersistenceResult<Option<StatusSnapshot>>;
}

/// Process-local status store, used by tests and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    history: RwLock<HashMap<String, Vec<StatusSnapshot>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot appended for `machine_id`, oldest first
    pub fn history(&self, machine_id: &str) -> Vec<StatusSnapshot> {
        self.history
            .read()
            .get(machine_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Wire form of every snapshot appended for `machine_id`, oldest first
    pub fn statuses(&self, machine_id: &str) -> Vec<String> {
        self.history(machine_id)
            .iter()
            .map(StatusSnapshot::status)
            .collect()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn append(&self, machine_id: &str, snapshot: &StatusSnapshot) -> PersistenceResult<()> {
        self.history
            .write()
            .entry(machine_id.to_string())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn latest(&self, machine_id: &str) -> PersistenceResult<Option<StatusSnapshot>> {
        Ok(self
            .history
            .read()
            .get(machine_id)
            .and_then(|snapshots| snapshots.last().cloned()))
    }
}

/// Turns transition steps into snapshots and rebuilds state from the latest one
#[derive(Clone)]
pub struct StatusPersister {
    store: Arc<dyn StatusStore>,
}

impl std::fmt::Debug for StatusPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPersister").finish_non_exhaustive()
    }
}

impl StatusPersister {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Persist one step. The implicit initial entry is never written.
    pub async fn on_transition(
        &self,
        machine_id: &str,
        definition: &WorkflowDefinition,
        step: &TransitionStep,
    ) -> StateMachineResult<Option<StatusSnapshot>> {
        if step.trigger.is_initial() {
            debug!(
                machine_id = %machine_id,
                state = %step.state,
                "Skipping persistence of initial state"
            );
            return Ok(None);
        }

        let snapshot = StatusSnapshot::from_transition(machine_id, definition, step);
        self.store.append(machine_id, &snapshot).await?;

        debug!(
            machine_id = %machine_id,
            trigger = %step.trigger,
            region = %step.region,
            status = %snapshot.status(),
            "Persisted status snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Rebuild the active state-set for `machine_id` from its latest snapshot.
    ///
    /// No snapshot yields the definition's initial composite state. A restored set with
    /// a pending join is settled here and the join step persisted before returning.
    pub async fn restore(
        &self,
        machine_id: &str,
        definition: &WorkflowDefinition,
    ) -> StateMachineResult<ActiveStateSet> {
        let Some(snapshot) = self.store.latest(machine_id).await? else {
            debug!(
                machine_id = %machine_id,
                workflow = %definition.name(),
                "No status recorded, starting from initial state"
            );
            return Ok(definition.initial_states());
        };

        let mut states = snapshot.restore(definition).inspect_err(|err| {
            warn!(
                machine_id = %machine_id,
                status = %snapshot.status(),
                error = %err,
                "Refusing to restore corrupt snapshot"
            );
        })?;

        for step in definition.settle(&states) {
            info!(
                machine_id = %machine_id,
                state = %step.state,
                "Completing pending join found during restore"
            );
            self.on_transition(machine_id, definition, &step).await?;
            states = step.after;
        }

        info!(
            machine_id = %machine_id,
            status = %snapshot.status(),
            states = %states,
            "Restored machine state"
        );
        Ok(states)
    }
}
