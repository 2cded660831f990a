use crate::error::CalcFlowError;
use thiserror::Error;

/// Error types for state machine engine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Unknown machine type: {machine_type}")]
    UnknownMachineType { machine_type: String },

    #[error("Calculation {machine_id} is not registered")]
    UnknownCalculation { machine_id: String },

    #[error("Machine {machine_id} is a {actual} machine, not {expected}")]
    MachineTypeMismatch {
        machine_id: String,
        expected: String,
        actual: String,
    },

    #[error("Corrupt snapshot for machine {machine_id}: {reason}")]
    CorruptSnapshot { machine_id: String, reason: String },

    #[error("Status store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Machine {machine_id} is not running")]
    MachineNotRunning { machine_id: String },

    #[error("Machine {machine_id} has been released")]
    MachineReleased { machine_id: String },

    #[error("Timed out after {timeout_ms}ms waiting for machine {machine_id} to {operation}")]
    LifecycleTimeout {
        machine_id: String,
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Invalid workflow definition '{workflow}': {reason}")]
    InvalidDefinition { workflow: String, reason: String },

    #[error("No transition available for machine {machine_id} from {states:?}")]
    NoTransitionAvailable {
        machine_id: String,
        states: Vec<String>,
    },

    #[error("Event {event} was not accepted by machine {machine_id} in {states:?}")]
    EventNotAccepted {
        machine_id: String,
        event: String,
        states: Vec<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error type for status store and calculation registry adapters
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to append status: {reason}")]
    AppendFailed { reason: String },

    #[error("Failed to read latest status for {machine_id}: {reason}")]
    ReadFailed { machine_id: String, reason: String },

    #[error("Invalid status record for {machine_id}: {status:?}")]
    InvalidStatusRecord { machine_id: String, status: String },

    #[error("Invalid machine id: {machine_id}")]
    InvalidMachineId { machine_id: String },

    #[error("Calculation {machine_id} not found")]
    CalculationNotFound { machine_id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<PersistenceError> for StateMachineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::InvalidStatusRecord { machine_id, status } => {
                Self::CorruptSnapshot {
                    machine_id,
                    reason: format!("unreadable status record {status:?}"),
                }
            }
            other => Self::StoreUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Helper function to create internal errors
pub fn internal_error(msg: impl Into<String>) -> StateMachineError {
    StateMachineError::Internal(msg.into())
}

/// Helper function to create corrupt snapshot errors
pub fn corrupt_snapshot(machine_id: impl Into<String>, reason: impl Into<String>) -> StateMachineError {
    StateMachineError::CorruptSnapshot {
        machine_id: machine_id.into(),
        reason: reason.into(),
    }
}

/// Helper function to create definition validation errors
pub fn invalid_definition(workflow: impl Into<String>, reason: impl Into<String>) -> StateMachineError {
    StateMachineError::InvalidDefinition {
        workflow: workflow.into(),
        reason: reason.into(),
    }
}

impl From<StateMachineError> for CalcFlowError {
    fn from(err: StateMachineError) -> Self {
        CalcFlowError::StateMachineError(format!("{err}"))
    }
}

impl From<PersistenceError> for CalcFlowError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Database(db_err) => CalcFlowError::DatabaseError(db_err.to_string()),
            other => CalcFlowError::PersistenceError(format!("{other}")),
        }
    }
}
