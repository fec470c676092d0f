//! Core WorkflowEngine implementation

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use log::{info, warn};
use uuid::Uuid;

use crate::cancel::CancellationFlag;
use crate::constants::ENGINE_VERSION;
use crate::engine::WorkflowDefinition;
use crate::environment::EnvironmentConfig;
use crate::event::{EventStore, InMemoryEventStore, RunEventKind};
use crate::gate::{ApprovalGate, GateOutcome};
use crate::model::ExecutionContext;
use crate::repo::{FailureReason, InMemoryRunRepository, RunRepository, WorkflowRun};
use crate::retry::run_with_retry;
use crate::step::{StepExecutor, StepResult};

/// Motor de ejecución de workflows lineales.
///
/// Ejecuta los steps en el orden declarado, detiene el run en el primer fallo
/// no recuperado y registra cada transición en el `EventStore`. El estado
/// observable (`WorkflowRun`) se obtiene siempre por replay.
pub struct WorkflowEngine {
    executor: StepExecutor,
    gate: Arc<ApprovalGate>,
    event_store: Arc<dyn EventStore>,
    repository: Arc<dyn RunRepository>,
    approval_timeout: Option<Duration>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    /// Engine con stores en memoria.
    pub fn new() -> Self {
        Self::new_with_stores(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryRunRepository::new()))
    }

    pub fn new_with_stores(event_store: Arc<dyn EventStore>, repository: Arc<dyn RunRepository>) -> Self {
        Self { executor: StepExecutor::new(),
               gate: Arc::new(ApprovalGate::new()),
               event_store,
               repository,
               approval_timeout: None }
    }

    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Espera máxima en un gate; sin valor se espera indefinidamente.
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = Some(timeout);
        self
    }

    pub fn gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    /// Snapshot actual de un run (replay de sus eventos).
    pub fn snapshot(&self, run_id: Uuid) -> WorkflowRun {
        self.repository.load(run_id, &self.event_store.list(run_id))
    }

    pub fn has_run(&self, run_id: Uuid) -> bool {
        !self.event_store.list(run_id).is_empty()
    }

    /// Descarta los eventos de un run.
    pub fn forget(&self, run_id: Uuid) {
        self.event_store.remove(run_id);
    }

    /// Crea el run en estado `pending`.
    pub fn initialize(&self, run_id: Uuid, environment: &EnvironmentConfig, definition: &WorkflowDefinition) -> WorkflowRun {
        self.event_store.append_kind(run_id,
                                     RunEventKind::RunInitialized { engine_version: ENGINE_VERSION.to_string(),
                                                                    workflow: definition.name().to_string(),
                                                                    environment: environment.clone(),
                                                                    step_ids: definition.step_ids() });
        self.snapshot(run_id)
    }

    /// Ejecuta un run nuevo hasta su estado terminal.
    pub async fn run(&self, environment: &EnvironmentConfig, definition: &WorkflowDefinition) -> WorkflowRun {
        let run_id = Uuid::new_v4();
        self.initialize(run_id, environment, definition);
        self.execute(run_id, environment, definition, &CancellationFlag::new()).await
    }

    /// Ejecuta un run ya inicializado. `cancel` se consulta en cada frontera
    /// de step y durante la espera de aprobación.
    pub async fn execute(&self,
                         run_id: Uuid,
                         environment: &EnvironmentConfig,
                         definition: &WorkflowDefinition,
                         cancel: &CancellationFlag)
                         -> WorkflowRun {
        self.event_store.append_kind(run_id, RunEventKind::RunStarted);
        info!("run {run_id}: workflow '{}' started for environment '{}'",
              definition.name(), environment.name);

        let mut outputs: IndexMap<String, String> = IndexMap::new();

        for (index, step) in definition.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                info!("run {run_id}: cancelled before step '{}'", step.id);
                return self.fail(run_id, FailureReason::Cancelled);
            }

            if ApprovalGate::applies(environment, step) {
                let pending = self.gate.open(run_id, &step.id);
                self.event_store.append_kind(run_id,
                                             RunEventKind::ApprovalRequested { step_index: index,
                                                                               step_id: step.id.clone() });
                info!("run {run_id}: awaiting approval for step '{}' in '{}'",
                      step.id, environment.name);
                let outcome = pending.wait(self.approval_timeout, cancel).await;
                self.event_store.append_kind(run_id,
                                             RunEventKind::ApprovalResolved { step_index: index,
                                                                              step_id: step.id.clone(),
                                                                              outcome });
                let reason = match outcome {
                    GateOutcome::Approved => None,
                    GateOutcome::Rejected => Some(FailureReason::ApprovalRejected { step_id: step.id.clone() }),
                    GateOutcome::TimedOut => Some(FailureReason::ApprovalTimeout { step_id: step.id.clone() }),
                    GateOutcome::Cancelled => Some(FailureReason::Cancelled),
                };
                if let Some(reason) = reason {
                    let skipped = StepResult::skipped(&step.id, reason.to_string());
                    self.event_store.append_kind(run_id,
                                                 RunEventKind::StepCompleted { step_index: index,
                                                                               result: skipped });
                    return self.fail(run_id, reason);
                }
            }

            let ctx = ExecutionContext::new(run_id, environment.clone(), &step.id).with_outputs(outputs.clone());
            self.event_store.append_kind(run_id,
                                         RunEventKind::StepStarted { step_index: index,
                                                                     step_id: step.id.clone(),
                                                                     attempt: 1 });
            let store = &self.event_store;
            let result = run_with_retry(&self.executor, step, &ctx, &step.effective_retry(), |failed, _next, delay| {
                             store.append_kind(run_id,
                                               RunEventKind::RetryScheduled { step_index: index,
                                                                              step_id: step.id.clone(),
                                                                              failed_attempt: failed.attempts,
                                                                              error: failed.error.clone(),
                                                                              delay });
                         }).await;

            self.event_store.append_kind(run_id,
                                         RunEventKind::StepCompleted { step_index: index,
                                                                       result: result.clone() });
            if !result.is_success() {
                let error = result.error.clone().unwrap_or_else(|| "step failed".to_string());
                warn!("run {run_id}: step '{}' failed after {} attempt(s): {error}",
                      step.id, result.attempts);
                return self.fail(run_id,
                                 FailureReason::StepExecutionFailed { step_id: step.id.clone(),
                                                                      error });
            }
            outputs.insert(step.id.clone(), result.output);
        }

        // Una cancelación aceptada durante el último step también cuenta.
        if cancel.is_cancelled() {
            info!("run {run_id}: cancelled after the last step");
            return self.fail(run_id, FailureReason::Cancelled);
        }
        self.event_store.append_kind(run_id, RunEventKind::RunSucceeded);
        info!("run {run_id}: succeeded");
        self.snapshot(run_id)
    }

    /// Marca la solicitud de cancelación en la traza del run.
    pub fn record_cancellation(&self, run_id: Uuid) {
        self.event_store.append_kind(run_id, RunEventKind::CancellationRequested);
    }

    fn fail(&self, run_id: Uuid, reason: FailureReason) -> WorkflowRun {
        warn!("run {run_id}: failed ({reason})");
        self.event_store.append_kind(run_id, RunEventKind::RunFailed { reason });
        self.snapshot(run_id)
    }
}
