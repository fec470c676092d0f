use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StepStatus;

/// Resultado inmutable de ejecutar un step (tras reintentos).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub output: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, output: String, started_at: DateTime<Utc>) -> Self {
        Self { step_id: step_id.into(),
               status: StepStatus::Success,
               attempts: 1,
               output,
               error: None,
               started_at,
               finished_at: Utc::now() }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>, output: String, started_at: DateTime<Utc>) -> Self {
        Self { step_id: step_id.into(),
               status: StepStatus::Failed,
               attempts: 1,
               output,
               error: Some(error.into()),
               started_at,
               finished_at: Utc::now() }
    }

    /// Step que no llegó a ejecutarse porque su gate no se abrió.
    pub fn skipped(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { step_id: step_id.into(),
               status: StepStatus::Skipped,
               attempts: 0,
               output: String::new(),
               error: Some(reason.into()),
               started_at: now,
               finished_at: now }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// Línea de traza: `apply: failed (3 attempts): exit status 1`.
    pub fn summary(&self) -> String {
        let attempts = match self.attempts {
            0 => "not executed".to_string(),
            1 => "1 attempt".to_string(),
            n => format!("{n} attempts"),
        };
        match &self.error {
            Some(e) => format!("{}: {} ({attempts}): {e}", self.step_id, self.status.as_str()),
            None => format!("{}: {} ({attempts})", self.step_id, self.status.as_str()),
        }
    }
}
