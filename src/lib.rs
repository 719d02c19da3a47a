//! ILS circulation core
//!
//! Loans, requests and transit between libraries: a pure loan state machine,
//! per-item request queues, patron limits and policy resolution, driven by an
//! orchestrator over abstract repositories.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{CirculationError, CirculationResult, ErrorKind};
pub use services::Services;
