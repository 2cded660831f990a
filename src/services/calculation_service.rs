//! # Calculation Service
//!
//! Drives calculations along their happy path: acquire the machine, pick the event
//! that advances it and send it. A library-level counterpart of an operator's
//! "advance this calculation" action.

use crate::registry::MachineRegistry;
use crate::state_machine::{EventId, StateId, StateMachineError, StateMachineResult};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CalculationService {
    registry: Arc<MachineRegistry>,
}

impl CalculationService {
    pub fn new(registry: Arc<MachineRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MachineRegistry> {
        &self.registry
    }

    /// Advance the calculation by one happy-path event and return its active states
    pub async fn next_state(
        &self,
        machine_type: &str,
        machine_id: &str,
    ) -> StateMachineResult<Vec<StateId>> {
        let machine = self.registry.acquire(machine_type, machine_id).await?;
        let states = machine.active_states();
        let current = machine.current_states();

        let event = machine.definition().next_event(&states).ok_or_else(|| {
            StateMachineError::NoTransitionAvailable {
                machine_id: machine_id.to_string(),
                states: names(&current),
            }
        })?;

        info!(
            machine_id = %machine_id,
            calculation_type = %machine_type,
            event = %event,
            states = ?names(&current),
            "Advancing calculation"
        );

        let outcome = machine.send(event.clone()).await?;
        if !outcome.accepted {
            return Err(StateMachineError::EventNotAccepted {
                machine_id: machine_id.to_string(),
                event: event.to_string(),
                states: names(&outcome.states),
            });
        }

        Ok(outcome.states)
    }

    /// Send a specific event; rejection is reported as `EventNotAccepted`
    pub async fn send_event(
        &self,
        machine_type: &str,
        machine_id: &str,
        event: impl Into<EventId>,
    ) -> StateMachineResult<Vec<StateId>> {
        let event = event.into();
        let machine = self.registry.acquire(machine_type, machine_id).await?;
        let outcome = machine.send(event.clone()).await?;

        if !outcome.accepted {
            return Err(StateMachineError::EventNotAccepted {
                machine_id: machine_id.to_string(),
                event: event.to_string(),
                states: names(&outcome.states),
            });
        }
        Ok(outcome.states)
    }

    /// Active states of the calculation, acquiring its machine if needed
    pub async fn current_states(
        &self,
        machine_type: &str,
        machine_id: &str,
    ) -> StateMachineResult<Vec<StateId>> {
        let machine = self.registry.acquire(machine_type, machine_id).await?;
        Ok(machine.current_states())
    }
}

fn names(states: &[StateId]) -> Vec<String> {
    states.iter().map(ToString::to_string).collect()
}
