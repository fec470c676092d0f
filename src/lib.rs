//! deployflow: aplicación sobre `flow-core`.
//!
//! - `config`: ajustes desde variables de entorno / `.env`.
//! - `errors`: errores de aplicación (`AppError`, `ConfigError`).
//! - `runner`: seguimiento de un run (gates de aprobación, interrupción).
//! - `workflows`: catálogo de workflows (deploy, apply-manifests, maintenance).
//!
//! El binario `deployflow` (src/main.rs) expone el trigger por CLI.

pub mod config;
pub mod errors;
pub mod runner;
pub mod workflows;

pub use config::AppConfig;
pub use errors::{AppError, ConfigError};
pub use workflows::{PlannedStep, WorkflowKind};
