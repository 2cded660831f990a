//! # Status Snapshots
//!
//! The flat, append-only record of a machine's composite state. A snapshot holds the
//! main-region state and, while the machine is forked, the secondary-region states in
//! the workflow's declared region order. On the wire it is a single `;`-delimited
//! status string (`MAIN;SEC_A;SEC_B`).

use super::composite::ActiveStateSet;
use super::definition::{TransitionStep, WorkflowDefinition};
use super::errors::{corrupt_snapshot, PersistenceError, PersistenceResult, StateMachineResult};
use super::states::{Region, StateId};
use crate::constants::STATUS_DELIMITER;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub machine_id: String,
    pub main_state: StateId,
    pub secondary_states: Vec<StateId>,
    pub created_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(
        machine_id: impl Into<String>,
        main_state: StateId,
        secondary_states: Vec<StateId>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            main_state,
            secondary_states,
            created_at: Utc::now(),
        }
    }

    /// Wire form: main state followed by secondaries, joined by `;`
    pub fn status(&self) -> String {
        std::iter::once(self.main_state.as_str())
            .chain(self.secondary_states.iter().map(StateId::as_str))
            .collect::<Vec<_>>()
            .join(STATUS_DELIMITER)
    }

    /// Parse a stored status string. Empty tokens are never accepted.
    pub fn from_status(
        machine_id: impl Into<String>,
        status: &str,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<Self> {
        let machine_id = machine_id.into();
        let tokens: Vec<&str> = status.split(STATUS_DELIMITER).map(str::trim).collect();

        if tokens.iter().any(|token| token.is_empty()) {
            return Err(PersistenceError::InvalidStatusRecord {
                machine_id,
                status: status.to_string(),
            });
        }

        let mut states = tokens.into_iter().map(StateId::from);
        let main_state = states
            .next()
            .ok_or_else(|| PersistenceError::InvalidStatusRecord {
                machine_id: machine_id.clone(),
                status: status.to_string(),
            })?;

        Ok(Self {
            machine_id,
            main_state,
            secondary_states: states.collect(),
            created_at,
        })
    }

    /// Snapshot describing the state right after `step`.
    ///
    /// A main-region step records only the main state. A sub-region step records the
    /// main state it happened under plus every secondary region that was active, with
    /// the changed region substituted.
    pub fn from_transition(
        machine_id: impl Into<String>,
        definition: &WorkflowDefinition,
        step: &TransitionStep,
    ) -> Self {
        if step.region.is_main() {
            return Self::new(machine_id, step.state.clone(), Vec::new());
        }

        let secondary_states = definition
            .secondary_regions()
            .iter()
            .filter_map(|region| {
                if *region == step.region {
                    Some(step.state.clone())
                } else {
                    step.before.get(region).cloned()
                }
            })
            .collect();

        Self::new(
            machine_id,
            step.before.main_state().clone(),
            secondary_states,
        )
    }

    /// Flatten a whole active state-set
    pub fn snapshot_of(
        machine_id: impl Into<String>,
        definition: &WorkflowDefinition,
        states: &ActiveStateSet,
    ) -> Self {
        let secondary_states = definition
            .secondary_regions()
            .iter()
            .filter_map(|region| states.get(region).cloned())
            .collect();

        Self::new(machine_id, states.main_state().clone(), secondary_states)
    }

    /// Rebuild the active state-set this snapshot describes
    pub fn restore(&self, definition: &WorkflowDefinition) -> StateMachineResult<ActiveStateSet> {
        let corrupt = |reason: String| corrupt_snapshot(self.machine_id.as_str(), reason);

        match definition.region_of(self.main_state.as_str()) {
            Some(Region::Main) => {}
            Some(region) => {
                return Err(corrupt(format!(
                    "main state {} belongs to region {region}",
                    self.main_state
                )))
            }
            None => {
                return Err(corrupt(format!(
                    "unknown state {} for workflow {}",
                    self.main_state,
                    definition.name()
                )))
            }
        }

        let base = ActiveStateSet::new(self.main_state.clone());
        let fork_targets = definition.fork_targets(self.main_state.as_str());

        if self.secondary_states.is_empty() {
            let Some(targets) = fork_targets else {
                return Ok(base);
            };
            // written before any sub-region moved: start every region at its fork target
            return Ok(targets.iter().fold(base, |set, target| {
                match definition.region_of(target.as_str()) {
                    Some(region) => set.with(region.clone(), target.clone()),
                    None => set,
                }
            }));
        }

        if fork_targets.is_none() {
            return Err(corrupt(format!(
                "secondary states recorded for non-forking state {}",
                self.main_state
            )));
        }

        let regions = definition.secondary_regions();
        if regions.len() != self.secondary_states.len() {
            return Err(corrupt(format!(
                "expected {} secondary states, found {}",
                regions.len(),
                self.secondary_states.len()
            )));
        }

        regions
            .iter()
            .zip(&self.secondary_states)
            .try_fold(base, |set, (region, state)| {
                match definition.region_of(state.as_str()) {
                    Some(actual) if actual == region => Ok(set.with(region.clone(), state.clone())),
                    Some(actual) => Err(corrupt(format!(
                        "state {state} belongs to region {actual}, expected {region}"
                    ))),
                    None => Err(corrupt(format!("unknown state {state}"))),
                }
            })
    }
}
