//! Tipos de evento del run y estructura `RunEvent`.
//!
//! Rol en el flujo:
//! - Cada transición del `WorkflowEngine` se emite a un `EventStore`
//!   append-only.
//! - El `RunRepository` reconstruye el `WorkflowRun` (replay) a partir de
//!   estos eventos; el estado observable nunca se guarda aparte.
//! - `RunEventKind` es el contrato estable con el exterior (trazas, reportes).
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::environment::EnvironmentConfig;
use crate::gate::GateOutcome;
use crate::repo::FailureReason;
use crate::step::StepResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// Primer evento de un `run_id`: fija entorno, workflow y orden de steps.
    RunInitialized {
        engine_version: String,
        workflow: String,
        environment: EnvironmentConfig,
        step_ids: Vec<String>,
    },
    /// pending -> running.
    RunStarted,
    /// Un intento de step comenzó. No implica éxito.
    StepStarted { step_index: usize, step_id: String, attempt: u32 },
    /// Intento fallido con reintento programado.
    RetryScheduled {
        step_index: usize,
        step_id: String,
        failed_attempt: u32,
        error: Option<String>,
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
    /// Resultado final de un step (success, failed o skipped).
    StepCompleted { step_index: usize, result: StepResult },
    /// running -> awaiting_approval.
    ApprovalRequested { step_index: usize, step_id: String },
    ApprovalResolved { step_index: usize, step_id: String, outcome: GateOutcome },
    /// Solicitud externa de cancelación (se aplica en la siguiente frontera).
    CancellationRequested,
    /// Cierre exitoso.
    RunSucceeded,
    /// Cierre con error; terminal.
    RunFailed { reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64, // asignado por el EventStore (orden append)
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}

impl RunEvent {
    /// Descripción legible para la traza del run.
    pub fn describe(&self) -> String {
        match &self.kind {
            RunEventKind::RunInitialized { workflow,
                                           environment,
                                           step_ids,
                                           .. } => format!("workflow '{}' initialized for environment '{}' ({} steps: {})",
                                                           workflow,
                                                           environment.name,
                                                           step_ids.len(),
                                                           step_ids.join(" -> ")),
            RunEventKind::RunStarted => "run started".to_string(),
            RunEventKind::StepStarted { step_id, attempt, .. } => format!("step '{step_id}' started (attempt {attempt})"),
            RunEventKind::RetryScheduled { step_id,
                                           failed_attempt,
                                           error,
                                           delay,
                                           .. } => format!("step '{}' attempt {} failed ({}); retrying in {}s",
                                                           step_id,
                                                           failed_attempt,
                                                           error.as_deref().unwrap_or("no error message"),
                                                           delay.as_secs()),
            RunEventKind::StepCompleted { result, .. } => format!("step {}", result.summary()),
            RunEventKind::ApprovalRequested { step_id, .. } => format!("awaiting approval for step '{step_id}'"),
            RunEventKind::ApprovalResolved { step_id, outcome, .. } => {
                format!("approval for step '{step_id}': {outcome:?}")
            }
            RunEventKind::CancellationRequested => "cancellation requested".to_string(),
            RunEventKind::RunSucceeded => "run succeeded".to_string(),
            RunEventKind::RunFailed { reason } => format!("run failed: {reason}"),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
