//! # Workflow Definitions
//!
//! An immutable graph of states, events and transitions for one calculation workflow,
//! plus the pure evaluator that turns `(active state-set, event)` into an ordered list
//! of persisted steps.
//!
//! ## Transition kinds
//!
//! - **External**: `(source, event) -> target` within one region
//! - **Fork**: fires automatically when its main-region source becomes active and
//!   activates one target in every declared secondary region
//! - **Join**: fires automatically once all of its sources are active and collapses the
//!   secondary regions into a single main-region target
//!
//! A definition may also declare a global error state. Its event is accepted from any
//! set that still has a non-terminal state and always lands on `{main: ERROR}`.
//!
//! Definitions are only constructed through [`WorkflowDefinitionBuilder::build`], which
//! rejects graphs the evaluator cannot handle deterministically.

use super::composite::ActiveStateSet;
use super::errors::{invalid_definition, StateMachineResult};
use super::events::{EventId, Trigger};
use super::states::{Region, StateDefinition, StateId};
use std::collections::{BTreeSet, HashMap, HashSet};

static MAIN_REGION: Region = Region::Main;

/// Join transition: all `sources` active collapses into `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTransition {
    pub sources: Vec<StateId>,
    pub target: StateId,
}

/// Global error handling declared by a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTransition {
    pub state: StateId,
    pub event: EventId,
}

/// One unit of persistence produced by an accepted evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionStep {
    pub trigger: Trigger,
    /// Region whose state changed
    pub region: Region,
    /// New state of that region
    pub state: StateId,
    pub before: ActiveStateSet,
    pub after: ActiveStateSet,
}

/// Result of evaluating one event against an active state-set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub accepted: bool,
    pub states: ActiveStateSet,
    pub steps: Vec<TransitionStep>,
}

impl TransitionOutcome {
    fn rejected(current: &ActiveStateSet) -> Self {
        Self {
            accepted: false,
            states: current.clone(),
            steps: Vec::new(),
        }
    }

    fn accepted(steps: Vec<TransitionStep>, fallback: &ActiveStateSet) -> Self {
        let states = steps
            .last()
            .map(|step| step.after.clone())
            .unwrap_or_else(|| fallback.clone());
        Self {
            accepted: true,
            states,
            steps,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    name: String,
    states: HashMap<StateId, StateDefinition>,
    state_order: Vec<StateId>,
    /// Outgoing external transitions per source, in declaration order
    externals: HashMap<StateId, Vec<(EventId, StateId)>>,
    forks: HashMap<StateId, Vec<StateId>>,
    joins: Vec<JoinTransition>,
    secondary_regions: Vec<Region>,
    initial: StateId,
    error: Option<ErrorTransition>,
}

impl WorkflowDefinition {
    pub fn builder(name: impl Into<String>) -> WorkflowDefinitionBuilder {
        WorkflowDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self, id: &str) -> Option<&StateDefinition> {
        self.states.get(id)
    }

    /// All states in declaration order
    pub fn states(&self) -> impl Iterator<Item = &StateDefinition> {
        self.state_order.iter().filter_map(|id| self.states.get(id))
    }

    /// Every event the definition accepts from at least one state
    pub fn events(&self) -> BTreeSet<EventId> {
        self.externals
            .values()
            .flat_map(|outgoing| outgoing.iter().map(|(event, _)| event.clone()))
            .chain(self.error.iter().map(|error| error.event.clone()))
            .collect()
    }

    pub fn region_of(&self, state: &str) -> Option<&Region> {
        self.states.get(state).map(|definition| &definition.region)
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.states
            .get(state)
            .map(|definition| definition.terminal)
            .unwrap_or(false)
    }

    /// Secondary regions in their declared order
    pub fn secondary_regions(&self) -> &[Region] {
        &self.secondary_regions
    }

    pub fn fork_targets(&self, source: &str) -> Option<&[StateId]> {
        self.forks.get(source).map(Vec::as_slice)
    }

    pub fn joins(&self) -> &[JoinTransition] {
        &self.joins
    }

    pub fn initial_state(&self) -> &StateId {
        &self.initial
    }

    pub fn error_transition(&self) -> Option<&ErrorTransition> {
        self.error.as_ref()
    }

    pub fn is_error_event(&self, event: &EventId) -> bool {
        self.error
            .as_ref()
            .map(|error| error.event == *event)
            .unwrap_or(false)
    }

    /// Main region followed by the declared secondary regions
    pub fn ordered_regions(&self) -> impl Iterator<Item = &Region> {
        std::iter::once(&MAIN_REGION).chain(self.secondary_regions.iter())
    }

    /// Target of the external transition leaving `state` on `event`
    pub fn external_target(&self, state: &str, event: &EventId) -> Option<&StateId> {
        self.externals
            .get(state)?
            .iter()
            .find(|(candidate, _)| candidate == event)
            .map(|(_, target)| target)
    }

    /// Composite state entered at construction, fork already applied
    pub fn initial_states(&self) -> ActiveStateSet {
        self.apply_fork(ActiveStateSet::new(self.initial.clone()))
    }

    /// Active states flattened main first, then secondaries in declared order
    pub fn ordered_states(&self, states: &ActiveStateSet) -> Vec<StateId> {
        self.ordered_regions()
            .filter_map(|region| states.get(region).cloned())
            .collect()
    }

    /// Evaluate `event` against `current`.
    ///
    /// Pure: the caller decides what to do with the steps. A rejected event yields the
    /// unchanged set and no steps.
    pub fn transition(&self, current: &ActiveStateSet, event: &EventId) -> TransitionOutcome {
        if let Some(error) = self.error.as_ref().filter(|error| error.event == *event) {
            let has_live_state = current
                .iter()
                .any(|(_, state)| !self.is_terminal(state.as_str()));
            if !has_live_state {
                return TransitionOutcome::rejected(current);
            }

            let step = TransitionStep {
                trigger: Trigger::Event(event.clone()),
                region: Region::Main,
                state: error.state.clone(),
                before: current.clone(),
                after: ActiveStateSet::new(error.state.clone()),
            };
            return TransitionOutcome::accepted(vec![step], current);
        }

        let found = self.ordered_regions().find_map(|region| {
            let state = current.get(region)?;
            self.external_target(state.as_str(), event)
                .map(|target| (region.clone(), target.clone()))
        });
        let Some((region, target)) = found else {
            return TransitionOutcome::rejected(current);
        };

        let after = if region.is_main() {
            // leaving the main state exits any parallel regions it owned
            self.apply_fork(current.without_sub_regions(target.clone()))
        } else {
            current.with(region.clone(), target.clone())
        };

        let mut steps = vec![TransitionStep {
            trigger: Trigger::Event(event.clone()),
            region,
            state: target,
            before: current.clone(),
            after: after.clone(),
        }];
        steps.extend(self.settle(&after));

        TransitionOutcome::accepted(steps, current)
    }

    /// Automatic steps pending on `states`: every join whose sources are all active.
    ///
    /// Each join fires at most once per call.
    pub fn settle(&self, states: &ActiveStateSet) -> Vec<TransitionStep> {
        let mut steps = Vec::new();
        let mut current = states.clone();
        let mut fired = vec![false; self.joins.len()];

        while current.is_forked() {
            let ready = self.joins.iter().enumerate().find(|(index, join)| {
                !fired[*index] && join.sources.iter().all(|source| current.contains(source))
            });
            let Some((index, join)) = ready else {
                break;
            };
            fired[index] = true;

            let after = self.apply_fork(current.without_sub_regions(join.target.clone()));
            steps.push(TransitionStep {
                trigger: Trigger::Join,
                region: Region::Main,
                state: join.target.clone(),
                before: current,
                after: after.clone(),
            });
            current = after;
        }

        steps
    }

    /// Happy-path event that advances `states`, ignoring the error event.
    ///
    /// The main region is advanced while unforked; otherwise the first secondary region
    /// in declared order that can still move.
    pub fn next_event(&self, states: &ActiveStateSet) -> Option<EventId> {
        if !states.is_forked() {
            return self.happy_event(states.main_state());
        }

        self.secondary_regions
            .iter()
            .filter_map(|region| states.get(region))
            .find_map(|state| self.happy_event(state))
    }

    fn happy_event(&self, state: &StateId) -> Option<EventId> {
        self.externals
            .get(state)?
            .iter()
            .map(|(event, _)| event)
            .find(|event| !self.is_error_event(event))
            .cloned()
    }

    fn apply_fork(&self, states: ActiveStateSet) -> ActiveStateSet {
        if states.is_forked() {
            return states;
        }
        let Some(targets) = self.forks.get(states.main_state()) else {
            return states;
        };

        targets.iter().fold(states, |set, target| match self.region_of(target.as_str()) {
            Some(region) => set.with(region.clone(), target.clone()),
            None => set,
        })
    }
}

/// Collects a workflow graph and validates it on [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct WorkflowDefinitionBuilder {
    name: String,
    states: Vec<StateDefinition>,
    externals: Vec<(StateId, EventId, StateId)>,
    forks: Vec<(StateId, Vec<StateId>)>,
    joins: Vec<JoinTransition>,
    secondary_regions: Vec<Region>,
    error: Option<ErrorTransition>,
}

impl WorkflowDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            externals: Vec::new(),
            forks: Vec::new(),
            joins: Vec::new(),
            secondary_regions: Vec::new(),
            error: None,
        }
    }

    pub fn state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn states(mut self, states: impl IntoIterator<Item = StateDefinition>) -> Self {
        self.states.extend(states);
        self
    }

    /// Declare the secondary regions; their order fixes the snapshot layout
    pub fn secondary_regions(mut self, regions: impl IntoIterator<Item = Region>) -> Self {
        self.secondary_regions.extend(regions);
        self
    }

    pub fn external(
        mut self,
        source: impl Into<StateId>,
        event: impl Into<EventId>,
        target: impl Into<StateId>,
    ) -> Self {
        self.externals
            .push((source.into(), event.into(), target.into()));
        self
    }

    pub fn fork<T: Into<StateId>>(
        mut self,
        source: impl Into<StateId>,
        targets: impl IntoIterator<Item = T>,
    ) -> Self {
        self.forks.push((
            source.into(),
            targets.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn join<S: Into<StateId>>(
        mut self,
        sources: impl IntoIterator<Item = S>,
        target: impl Into<StateId>,
    ) -> Self {
        self.joins.push(JoinTransition {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
        });
        self
    }

    /// Declare the global error state and the event that reaches it
    pub fn error(mut self, state: impl Into<StateId>, event: impl Into<EventId>) -> Self {
        self.error = Some(ErrorTransition {
            state: state.into(),
            event: event.into(),
        });
        self
    }

    pub fn build(self) -> StateMachineResult<WorkflowDefinition> {
        let name = self.name;
        let invalid = |reason: String| invalid_definition(name.clone(), reason);

        // states and regions
        let mut declared_regions: HashSet<&Region> = HashSet::new();
        for region in &self.secondary_regions {
            if region.is_main() {
                return Err(invalid("main region cannot be declared as secondary".into()));
            }
            if !declared_regions.insert(region) {
                return Err(invalid(format!("secondary region {region} declared twice")));
            }
        }

        let mut states: HashMap<StateId, StateDefinition> = HashMap::new();
        let mut state_order = Vec::with_capacity(self.states.len());
        for state in &self.states {
            if !state.region.is_main() && !declared_regions.contains(&state.region) {
                return Err(invalid(format!(
                    "state {} belongs to undeclared region {}",
                    state.id, state.region
                )));
            }
            if states.insert(state.id.clone(), state.clone()).is_some() {
                return Err(invalid(format!("state {} declared twice", state.id)));
            }
            state_order.push(state.id.clone());
        }

        let mut initial = None;
        for region in std::iter::once(&MAIN_REGION).chain(self.secondary_regions.iter()) {
            let initials: Vec<&StateDefinition> = self
                .states
                .iter()
                .filter(|state| state.region == *region && state.initial)
                .collect();
            match initials.as_slice() {
                [single] => {
                    if region.is_main() {
                        initial = Some(single.id.clone());
                    }
                }
                [] => return Err(invalid(format!("region {region} has no initial state"))),
                _ => {
                    return Err(invalid(format!(
                        "region {region} has {} initial states",
                        initials.len()
                    )))
                }
            }
        }
        let initial = initial.ok_or_else(|| invalid("main region has no initial state".into()))?;

        let lookup = |id: &StateId| lookup_state(&name, &states, id);

        // error handling
        if let Some(error) = &self.error {
            let state = lookup(&error.state)?;
            if !state.region.is_main() || !state.terminal {
                return Err(invalid(format!(
                    "error state {} must be a terminal main-region state",
                    error.state
                )));
            }
        }

        // external transitions
        let mut externals: HashMap<StateId, Vec<(EventId, StateId)>> = HashMap::new();
        let mut event_regions: HashMap<&EventId, &Region> = HashMap::new();
        for (source, event, target) in &self.externals {
            let source_state = lookup(source)?;
            let target_state = lookup(target)?;

            if self.error.as_ref().map(|error| error.event == *event).unwrap_or(false) {
                return Err(invalid(format!(
                    "error event {event} cannot have explicit transitions"
                )));
            }
            if source_state.terminal {
                return Err(invalid(format!(
                    "terminal state {source} has outgoing transition on {event}"
                )));
            }
            if source_state.region != target_state.region {
                return Err(invalid(format!(
                    "transition {source} -> {target} crosses regions"
                )));
            }
            match event_regions.insert(event, &source_state.region) {
                Some(previous) if *previous != source_state.region => {
                    return Err(invalid(format!(
                        "event {event} is used in regions {previous} and {}",
                        source_state.region
                    )))
                }
                _ => {}
            }

            let outgoing = externals.entry(source.clone()).or_default();
            if outgoing.iter().any(|(existing, _)| existing == event) {
                return Err(invalid(format!(
                    "state {source} has more than one transition on {event}"
                )));
            }
            outgoing.push((event.clone(), target.clone()));
        }

        let covers_every_region = |members: &[StateId]| -> StateMachineResult<()> {
            let mut seen: Vec<&Region> = Vec::with_capacity(members.len());
            for member in members {
                let region = &lookup(member)?.region;
                if region.is_main() || seen.contains(&region) {
                    return Err(invalid(format!(
                        "{member} does not add a new secondary region"
                    )));
                }
                seen.push(region);
            }
            if seen.len() != self.secondary_regions.len() {
                return Err(invalid(format!(
                    "expected one state per secondary region, got {}",
                    seen.len()
                )));
            }
            Ok(())
        };

        // forks and joins
        let mut forks: HashMap<StateId, Vec<StateId>> = HashMap::new();
        for (source, targets) in &self.forks {
            if !lookup(source)?.region.is_main() {
                return Err(invalid(format!("fork source {source} is not in the main region")));
            }
            covers_every_region(targets)?;
            if forks.insert(source.clone(), targets.clone()).is_some() {
                return Err(invalid(format!("state {source} forks twice")));
            }
        }
        for join in &self.joins {
            if !lookup(&join.target)?.region.is_main() {
                return Err(invalid(format!(
                    "join target {} is not in the main region",
                    join.target
                )));
            }
            covers_every_region(&join.sources)?;
        }
        if !self.secondary_regions.is_empty() && (forks.is_empty() || self.joins.is_empty()) {
            return Err(invalid(
                "secondary regions require at least one fork and one join".into(),
            ));
        }

        Ok(WorkflowDefinition {
            name,
            states,
            state_order,
            externals,
            forks,
            joins: self.joins,
            secondary_regions: self.secondary_regions,
            initial,
            error: self.error,
        })
    }
}

fn lookup_state<'a>(
    workflow: &str,
    states: &'a HashMap<StateId, StateDefinition>,
    id: &StateId,
) -> StateMachineResult<&'a StateDefinition> {
    states
        .get(id)
        .ok_or_else(|| invalid_definition(workflow, format!("unknown state {id}")))
}
