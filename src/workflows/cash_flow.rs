//! Linear cash flow calculation: one pipeline in the main region plus the global
//! error state.

use super::pipeline::Pipeline;
use crate::constants::workflows::{CASH_FLOW, ERROR_EVENT, ERROR_STATE};
use crate::state_machine::{Region, StateDefinition, StateMachineResult, WorkflowDefinition};

pub fn definition() -> StateMachineResult<WorkflowDefinition> {
    Pipeline::main()
        .apply(WorkflowDefinition::builder(CASH_FLOW))
        .state(StateDefinition::new(ERROR_STATE, Region::Main).terminal())
        .error(ERROR_STATE, ERROR_EVENT)
        .build()
}
