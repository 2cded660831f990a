//! VSSDV calculation: the main region forks into the `VAR_MODEL` and `BLACK_MODEL`
//! pipelines, which run concurrently and join into a final `VSSDV_` pipeline.

use super::pipeline::{stage, Pipeline};
use crate::constants::workflows::{ERROR_EVENT, ERROR_STATE, VSSDV};
use crate::state_machine::{Region, StateDefinition, StateMachineResult, WorkflowDefinition};

pub const VAR_MODEL: &str = "VAR_MODEL";
pub const BLACK_MODEL: &str = "BLACK_MODEL";
const FINAL_PHASE: &str = "VSSDV";

/// Main-region state that forks into both model pipelines
pub const STARTED: &str = "STARTED";

pub fn definition() -> StateMachineResult<WorkflowDefinition> {
    let var_model = Pipeline::prefixed(VAR_MODEL, Region::sub(VAR_MODEL), true);
    let black_model = Pipeline::prefixed(BLACK_MODEL, Region::sub(BLACK_MODEL), true);
    let final_phase = Pipeline::prefixed(FINAL_PHASE, Region::Main, false);

    let builder = WorkflowDefinition::builder(VSSDV)
        .secondary_regions([Region::sub(VAR_MODEL), Region::sub(BLACK_MODEL)])
        .state(StateDefinition::new(STARTED, Region::Main).initial());
    let builder = [&var_model, &black_model, &final_phase]
        .into_iter()
        .fold(builder, |builder, pipeline| pipeline.apply(builder));

    builder
        .fork(STARTED, [var_model.first(), black_model.first()])
        .join([var_model.last(), black_model.last()], final_phase.first())
        .state(StateDefinition::new(ERROR_STATE, Region::Main).terminal())
        .error(ERROR_STATE, ERROR_EVENT)
        .build()
}

/// Name of a stage inside one of the model pipelines
pub fn model_stage(model: &str, name: &str) -> String {
    stage(Some(model), name)
}
