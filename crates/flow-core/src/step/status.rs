use serde::{Deserialize, Serialize};

/// Resultado final de un step dentro de un run.
///
/// `Skipped` sólo aparece cuando el gate de aprobación de ese step no se
/// abrió (rechazo, timeout o cancelación mientras esperaba).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}
