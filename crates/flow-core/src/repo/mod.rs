pub mod types;
pub use types::{FailureReason, InMemoryRunRepository, RunRepository, RunStatus, WorkflowRun};
