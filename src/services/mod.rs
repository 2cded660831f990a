pub mod calculation_service;

pub use calculation_service::CalculationService;
