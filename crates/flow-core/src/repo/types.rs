//! Estado reconstruido de un run (`WorkflowRun`).
//!
//! El repositorio aplica un replay lineal: consume los eventos en orden y
//! actualiza el snapshot. Nunca se persiste el snapshot por separado, así que
//! el estado y la traza no pueden divergir.
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::environment::EnvironmentConfig;
use crate::event::{RunEvent, RunEventKind};
use crate::step::StepResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    AwaitingApproval,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::AwaitingApproval => "awaiting_approval",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

/// Motivo por el que un run terminó en `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    StepExecutionFailed { step_id: String, error: String },
    ApprovalRejected { step_id: String },
    ApprovalTimeout { step_id: String },
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::StepExecutionFailed { step_id, error } => {
                write!(f, "StepExecutionFailed: step '{step_id}': {error}")
            }
            FailureReason::ApprovalRejected { step_id } => write!(f, "ApprovalRejected: step '{step_id}'"),
            FailureReason::ApprovalTimeout { step_id } => write!(f, "ApprovalTimeout: step '{step_id}'"),
            FailureReason::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Snapshot de un run. `results[i]` corresponde a `step_ids[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub workflow: String,
    pub environment: Option<EnvironmentConfig>,
    pub step_ids: Vec<String>,
    pub results: Vec<StepResult>,
    pub overall_status: RunStatus,
    pub current_step_id: Option<String>,
    pub failure: Option<FailureReason>,
    pub cancel_requested: bool,
    /// Traza legible y ordenada de todo lo ocurrido.
    pub trace: Vec<String>,
}

impl WorkflowRun {
    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }

    /// Código de salida del interfaz de trigger: 0 éxito, 1 fallo.
    pub fn exit_code(&self) -> u8 {
        match self.overall_status {
            RunStatus::Succeeded => 0,
            _ => 1,
        }
    }

    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    /// Informe multilínea (resultado final + resumen por step) para logs y
    /// notificaciones.
    pub fn report(&self) -> String {
        let env = self.environment.as_ref().map(|e| e.name.as_str()).unwrap_or("?");
        let mut lines = vec![format!("run {} ({} @ {}): {}",
                                     self.run_id,
                                     self.workflow,
                                     env,
                                     self.overall_status.as_str())];
        for (i, r) in self.results.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, r.summary()));
        }
        if let Some(reason) = &self.failure {
            lines.push(format!("  reason: {reason}"));
        }
        lines.join("\n")
    }
}

/// Trait para reconstruir (`replay`) el estado de un run a partir de eventos.
pub trait RunRepository: Send + Sync {
    fn load(&self, run_id: Uuid, events: &[RunEvent]) -> WorkflowRun;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryRunRepository;

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self
    }
}

impl RunRepository for InMemoryRunRepository {
    fn load(&self, run_id: Uuid, events: &[RunEvent]) -> WorkflowRun {
        let mut run = WorkflowRun { run_id,
                                    workflow: String::new(),
                                    environment: None,
                                    step_ids: Vec::new(),
                                    results: Vec::new(),
                                    overall_status: RunStatus::Pending,
                                    current_step_id: None,
                                    failure: None,
                                    cancel_requested: false,
                                    trace: Vec::with_capacity(events.len()) };
        for ev in events {
            // Los estados terminales son finales: lo que llegue después (una
            // cancelación que perdió la carrera con el final) no cuenta.
            if run.overall_status.is_terminal() {
                break;
            }
            run.trace.push(ev.describe());
            match &ev.kind {
                RunEventKind::RunInitialized { workflow,
                                               environment,
                                               step_ids,
                                               .. } => {
                    run.workflow = workflow.clone();
                    run.environment = Some(environment.clone());
                    run.step_ids = step_ids.clone();
                }
                RunEventKind::RunStarted => run.overall_status = RunStatus::Running,
                RunEventKind::StepStarted { step_id, .. } => {
                    run.current_step_id = Some(step_id.clone());
                }
                RunEventKind::RetryScheduled { .. } => {}
                RunEventKind::StepCompleted { result, .. } => run.results.push(result.clone()),
                RunEventKind::ApprovalRequested { step_id, .. } => {
                    run.overall_status = RunStatus::AwaitingApproval;
                    run.current_step_id = Some(step_id.clone());
                }
                RunEventKind::ApprovalResolved { outcome, .. } => {
                    if matches!(outcome, crate::gate::GateOutcome::Approved) {
                        run.overall_status = RunStatus::Running;
                    }
                }
                RunEventKind::CancellationRequested => run.cancel_requested = true,
                RunEventKind::RunSucceeded => {
                    run.overall_status = RunStatus::Succeeded;
                    run.current_step_id = None;
                    // Llegó tarde: el engine ya había pasado la última frontera.
                    run.cancel_requested = false;
                }
                RunEventKind::RunFailed { reason } => {
                    run.overall_status = RunStatus::Failed;
                    run.failure = Some(reason.clone());
                }
            }
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ResourceTier;
    use crate::event::{EventStore, InMemoryEventStore};
    use crate::gate::GateOutcome;
    use chrono::Utc;

    #[test]
    fn replay_tracks_awaiting_approval_and_rejection() {
        let store = InMemoryEventStore::new();
        let run_id = Uuid::new_v4();
        let env = EnvironmentConfig::new("prod", "awx-prod", 3, ResourceTier::Large, true);
        store.append_kind(run_id,
                          RunEventKind::RunInitialized { engine_version: "test".into(),
                                                         workflow: "deploy".into(),
                                                         environment: env,
                                                         step_ids: vec!["plan".into(), "apply".into()] });
        store.append_kind(run_id, RunEventKind::RunStarted);
        store.append_kind(run_id,
                          RunEventKind::StepCompleted { step_index: 0,
                                                        result: StepResult::success("plan", "ok".into(), Utc::now()) });
        store.append_kind(run_id,
                          RunEventKind::ApprovalRequested { step_index: 1,
                                                            step_id: "apply".into() });

        let repo = InMemoryRunRepository::new();
        let snap = repo.load(run_id, &store.list(run_id));
        assert_eq!(snap.overall_status, RunStatus::AwaitingApproval);
        assert_eq!(snap.current_step_id.as_deref(), Some("apply"));
        assert_eq!(snap.results.len(), 1);

        store.append_kind(run_id,
                          RunEventKind::ApprovalResolved { step_index: 1,
                                                           step_id: "apply".into(),
                                                           outcome: GateOutcome::Rejected });
        store.append_kind(run_id,
                          RunEventKind::RunFailed { reason: FailureReason::ApprovalRejected { step_id: "apply".into() } });
        let snap = repo.load(run_id, &store.list(run_id));
        assert_eq!(snap.overall_status, RunStatus::Failed);
        assert!(snap.is_terminal());
        assert_eq!(snap.exit_code(), 1);
        assert_eq!(snap.trace.len(), 6);
        assert!(snap.report().contains("ApprovalRejected"));
    }

    #[test]
    fn late_cancellation_does_not_touch_a_finished_run() {
        let store = InMemoryEventStore::new();
        let run_id = Uuid::new_v4();
        let env = EnvironmentConfig::new("dev", "awx-dev", 1, ResourceTier::Small, false);
        store.append_kind(run_id,
                          RunEventKind::RunInitialized { engine_version: "test".into(),
                                                         workflow: "deploy".into(),
                                                         environment: env,
                                                         step_ids: vec!["apply".into()] });
        store.append_kind(run_id, RunEventKind::RunStarted);
        store.append_kind(run_id,
                          RunEventKind::StepCompleted { step_index: 0,
                                                        result: StepResult::success("apply", "ok".into(), Utc::now()) });
        store.append_kind(run_id, RunEventKind::RunSucceeded);
        store.append_kind(run_id, RunEventKind::CancellationRequested);

        let repo = InMemoryRunRepository::new();
        let snap = repo.load(run_id, &store.list(run_id));
        assert_eq!(snap.overall_status, RunStatus::Succeeded);
        assert!(!snap.cancel_requested);
        assert_eq!(snap.trace.len(), 4);
    }

    #[test]
    fn cancellation_recorded_before_success_is_cleared() {
        let store = InMemoryEventStore::new();
        let run_id = Uuid::new_v4();
        store.append_kind(run_id, RunEventKind::RunStarted);
        store.append_kind(run_id, RunEventKind::CancellationRequested);
        store.append_kind(run_id, RunEventKind::RunSucceeded);

        let snap = InMemoryRunRepository::new().load(run_id, &store.list(run_id));
        assert_eq!(snap.overall_status, RunStatus::Succeeded);
        assert!(!snap.cancel_requested);
    }
}
