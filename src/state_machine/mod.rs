// State machine engine for calculation workflows
//
// Hierarchical/parallel workflow definitions, their flat snapshot form, and the
// recoverable machine instances that drive them.

pub mod composite;
pub mod definition;
pub mod errors;
pub mod events;
pub mod instance;
pub mod persistence;
pub mod snapshot;
pub mod states;

// Re-export main types for convenient access
pub use composite::ActiveStateSet;
pub use definition::{
    ErrorTransition, JoinTransition, TransitionOutcome, TransitionStep, WorkflowDefinition,
    WorkflowDefinitionBuilder,
};
pub use errors::{PersistenceError, PersistenceResult, StateMachineError, StateMachineResult};
pub use events::{EventId, Trigger};
pub use instance::{EventOutcome, MachineCommand, MachineInstance};
pub use persistence::{InMemoryStatusStore, StatusPersister, StatusStore};
pub use snapshot::StatusSnapshot;
pub use states::{Region, StateDefinition, StateId};
