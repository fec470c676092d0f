//! Errores del core.
//!
//! Sólo las condiciones de política (entorno desconocido, run en curso, gate
//! inexistente) se devuelven como error inmediato al llamador. Los fallos de
//! un step nunca salen del executor: se registran como `StepResult`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("invalid environment '{name}': {reason}")]
    InvalidEnvironment { name: String, reason: String },
    #[error("invalid workflow '{name}': {reason}")]
    InvalidWorkflow { name: String, reason: String },
    #[error("step '{step_id}' failed: {error}")]
    StepExecutionFailed { step_id: String, error: String },
    #[error("approval rejected for step '{0}'")]
    ApprovalRejected(String),
    #[error("approval timed out for step '{0}'")]
    ApprovalTimeout(String),
    #[error("a run is already in progress for environment '{0}'")]
    RunInProgress(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("unknown run: {0}")]
    UnknownRun(Uuid),
    #[error("no pending approval for step '{step_id}' in run {run_id}")]
    NoPendingApproval { run_id: Uuid, step_id: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl CoreEngineError {
    /// Código de salida del interfaz de trigger (0 y 1 los fija el estado
    /// terminal del run, no un error).
    pub fn exit_code(&self) -> u8 {
        match self {
            CoreEngineError::UnknownEnvironment(_) => 2,
            CoreEngineError::RunInProgress(_) => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_trigger_contract() {
        assert_eq!(CoreEngineError::UnknownEnvironment("qa".into()).exit_code(), 2);
        assert_eq!(CoreEngineError::RunInProgress("dev".into()).exit_code(), 3);
        assert_eq!(CoreEngineError::Cancelled.exit_code(), 1);
    }
}
