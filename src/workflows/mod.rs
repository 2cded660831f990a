//! # Bundled Calculation Workflows
//!
//! The workflow definitions the engine ships with, keyed by [`CalculationType`].
//!
//! - **cash_flow**: linear pipeline
//! - **vssdv**: two model pipelines in parallel, joined into a final pipeline

pub mod cash_flow;
pub mod pipeline;
pub mod vssdv;

use crate::constants::workflows::{CASH_FLOW, VSSDV};
use crate::state_machine::{StateMachineError, StateMachineResult, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of calculation, selecting the workflow that drives it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    CashFlow,
    Vssdv,
}

impl CalculationType {
    pub const ALL: [CalculationType; 2] = [CalculationType::CashFlow, CalculationType::Vssdv];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashFlow => CASH_FLOW,
            Self::Vssdv => VSSDV,
        }
    }

    /// Build this type's workflow definition
    pub fn definition(&self) -> StateMachineResult<WorkflowDefinition> {
        match self {
            Self::CashFlow => cash_flow::definition(),
            Self::Vssdv => vssdv::definition(),
        }
    }
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationType {
    type Err = StateMachineError;

    /// Case-insensitive; `cashflow` is accepted as an alias of `cash_flow`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash_flow" | "cashflow" => Ok(Self::CashFlow),
            "vssdv" => Ok(Self::Vssdv),
            _ => Err(StateMachineError::UnknownMachineType {
                machine_type: s.to_string(),
            }),
        }
    }
}
