//! The shared calculation pipeline shape: data preparation, ETL load, remote
//! calculation, reverse ETL and completion. Both bundled workflows are assembled from
//! prefixed copies of it.

use crate::state_machine::{Region, StateDefinition, WorkflowDefinitionBuilder};

/// Pipeline stages in order. Each transition's event is named after its target.
pub const STAGES: [&str; 17] = [
    "STARTED",
    "DATA_PREPARED",
    "DATA_STAGED",
    "ETL_START",
    "ETL_SENT",
    "ETL_ACCEPTED",
    "ETL_DONE",
    "CALC_START",
    "CALC_SENT",
    "CALC_ACCEPTED",
    "CALC_DONE",
    "REV_ETL_START",
    "REV_ETL_SENT",
    "REV_ETL_ACCEPTED",
    "REV_ETL_DONE",
    "DATA_UNSTAGED",
    "FINISHED",
];

/// Stage name with an optional prefix, e.g. `VAR_MODEL_ETL_SENT`
pub fn stage(prefix: Option<&str>, stage: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}_{stage}"),
        None => stage.to_string(),
    }
}

/// Where and how a pipeline copy is placed in a workflow
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    pub prefix: Option<&'a str>,
    pub region: Region,
    /// Mark the first stage as the region's initial state
    pub initial: bool,
}

impl<'a> Pipeline<'a> {
    pub fn main() -> Self {
        Self {
            prefix: None,
            region: Region::Main,
            initial: true,
        }
    }

    pub fn prefixed(prefix: &'a str, region: Region, initial: bool) -> Self {
        Self {
            prefix: Some(prefix),
            region,
            initial,
        }
    }

    pub fn first(&self) -> String {
        stage(self.prefix, STAGES[0])
    }

    pub fn last(&self) -> String {
        stage(self.prefix, STAGES[STAGES.len() - 1])
    }

    /// Add every stage and the linear transitions between them. The last stage is
    /// terminal.
    pub fn apply(&self, builder: WorkflowDefinitionBuilder) -> WorkflowDefinitionBuilder {
        let names: Vec<String> = STAGES
            .iter()
            .map(|name| stage(self.prefix, name))
            .collect();
        let last = names.len() - 1;

        let builder = names.iter().enumerate().fold(builder, |builder, (index, name)| {
            let mut state = StateDefinition::new(name.as_str(), self.region.clone());
            if index == 0 && self.initial {
                state = state.initial();
            }
            if index == last {
                state = state.terminal();
            }
            builder.state(state)
        });

        names.windows(2).fold(builder, |builder, pair| {
            builder.external(pair[0].as_str(), pair[1].as_str(), pair[1].as_str())
        })
    }
}
