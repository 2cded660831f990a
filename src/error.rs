use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State machine error: {0}")]
    StateMachineError(String),
    #[error("Persistence error: {0}")]
    PersistenceError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub type Result<T> = std::result::Result<T, CalcFlowError>;
