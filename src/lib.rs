#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Calc Flow
//!
//! Durable, recoverable state machines for long-running calculation pipelines.
//!
//! ## Overview
//!
//! Every in-flight calculation is a state machine keyed by its machine id. It advances
//! only on explicit events and survives process restarts by rebuilding its exact
//! position, including concurrently active sub-workflows, from an append-only status
//! log.
//!
//! ## Architecture
//!
//! ```text
//! caller ──acquire──▶ MachineRegistry ──restore──▶ StatusPersister ──latest──▶ StatusStore
//!    │                      │
//!    └──send(event)──▶ MachineInstance ──▶ WorkflowDefinition::transition
//!                           │
//!                           └──each step──▶ StatusPersister ──append──▶ StatusStore
//! ```
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Definitions, composite state, snapshots, instances
//! - [`workflows`] - The bundled cash flow and VSSDV workflows
//! - [`registry`] - Machine lifecycle registry and calculation registry
//! - [`services`] - Happy-path driver over the registry
//! - [`database`] - PostgreSQL status store and calculation registry
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calc_flow::config::EngineConfig;
//! use calc_flow::registry::{Calculation, InMemoryCalculationRegistry, MachineRegistry};
//! use calc_flow::state_machine::InMemoryStatusStore;
//! use calc_flow::workflows::CalculationType;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let calculations = Arc::new(InMemoryCalculationRegistry::new());
//! let machine_id = calculations.register(Calculation::new("Q3", CalculationType::Vssdv));
//!
//! let registry = MachineRegistry::new(
//!     Arc::new(InMemoryStatusStore::new()),
//!     calculations,
//!     EngineConfig::default(),
//! )?;
//!
//! let machine = registry.acquire("vssdv", &machine_id).await?;
//! let outcome = machine.send("VAR_MODEL_DATA_PREPARED").await?;
//! assert!(outcome.accepted);
//!
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod registry;
pub mod services;
pub mod state_machine;
pub mod workflows;

pub use config::{CalcFlowConfig, ConfigManager, DatabaseConfig, EngineConfig, LoggingConfig};
pub use error::{CalcFlowError, Result};
pub use registry::{CalculationRegistry, MachineRegistry};
pub use services::CalculationService;
pub use state_machine::{
    EventOutcome, MachineInstance, StateMachineError, StatusSnapshot, StatusStore,
    WorkflowDefinition,
};
pub use workflows::CalculationType;
