//! Modelos neutrales compartidos por executor, engine y acciones.

pub mod context;

pub use context::ExecutionContext;
