//! # Registry Infrastructure
//!
//! Registries the engine consults at runtime.
//!
//! ## Available Registries
//!
//! - **MachineRegistry**: live machine instances, with acquire/release/shutdown
//! - **CalculationRegistry**: existence check for machine ids
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── MachineRegistry       (instance lifecycle, one instance per machine id)
//! └── CalculationRegistry   (known calculations, in-memory or PostgreSQL)
//! ```

pub mod calculation_registry;
pub mod machine_registry;

// Re-export main types for easy access
pub use calculation_registry::{Calculation, CalculationRegistry, InMemoryCalculationRegistry};
pub use machine_registry::{MachineRegistry, RegistryStats};
