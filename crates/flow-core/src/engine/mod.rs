//! Engine module for WorkflowEngine implementation
//!
//! Provides the core engine and the declarative workflow definition it runs.

pub mod core;
pub mod definition;

pub use self::core::WorkflowEngine;
pub use definition::{WorkflowBuilder, WorkflowDefinition};
