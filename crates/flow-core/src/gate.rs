//! Approval Gate: barrera de confirmación manual antes de steps sensibles.
//!
//! El engine abre el gate (`open`) antes de publicar `ApprovalRequested`, de
//! modo que un actor externo que observe el estado `awaiting_approval` siempre
//! encuentra el gate pendiente al llamar a `resolve`. Una decisión que llega
//! antes de que el gate exista se rechaza con `NoPendingApproval`.

use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::cancel::CancellationFlag;
use crate::environment::EnvironmentConfig;
use crate::errors::CoreEngineError;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Approved,
    Rejected,
    TimedOut,
    Cancelled,
}

type GateKey = (Uuid, String);

#[derive(Debug, Default)]
pub struct ApprovalGate {
    pending: DashMap<GateKey, oneshot::Sender<ApprovalDecision>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// El gate sólo aplica si el entorno exige aprobación y el step la pide.
    pub fn applies(environment: &EnvironmentConfig, step: &Step) -> bool {
        environment.approval_required && step.requires_approval
    }

    /// Registra el gate como pendiente. La espera se hace con
    /// `PendingApproval::wait`.
    pub fn open(&self, run_id: Uuid, step_id: &str) -> PendingApproval<'_> {
        let (tx, rx) = oneshot::channel();
        let key = (run_id, step_id.to_string());
        self.pending.insert(key.clone(), tx);
        debug!("approval gate opened for run {run_id} step '{step_id}'");
        PendingApproval { gate: self,
                          key,
                          rx: Some(rx) }
    }

    /// `open` + `wait` en una sola llamada.
    pub async fn await_decision(&self,
                                run_id: Uuid,
                                step_id: &str,
                                max_wait: Option<Duration>,
                                cancel: &CancellationFlag)
                                -> GateOutcome {
        self.open(run_id, step_id).wait(max_wait, cancel).await
    }

    pub fn resolve(&self, run_id: Uuid, step_id: &str, decision: ApprovalDecision) -> Result<(), CoreEngineError> {
        let not_pending = || CoreEngineError::NoPendingApproval { run_id,
                                                                 step_id: step_id.to_string() };
        let (_, tx) = self.pending
                          .remove(&(run_id, step_id.to_string()))
                          .ok_or_else(not_pending)?;
        info!("approval for run {run_id} step '{step_id}': {decision:?}");
        tx.send(decision).map_err(|_| not_pending())
    }

    pub fn is_pending(&self, run_id: Uuid, step_id: &str) -> bool {
        self.pending.contains_key(&(run_id, step_id.to_string()))
    }
}

/// Gate abierto a la espera de decisión. Al soltarse se retira del mapa de
/// pendientes.
pub struct PendingApproval<'a> {
    gate: &'a ApprovalGate,
    key: GateKey,
    rx: Option<oneshot::Receiver<ApprovalDecision>>,
}

impl PendingApproval<'_> {
    pub async fn wait(mut self, max_wait: Option<Duration>, cancel: &CancellationFlag) -> GateOutcome {
        let Some(rx) = self.rx.take() else {
            return GateOutcome::Cancelled;
        };
        let deadline = async {
            match max_wait {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            decision = rx => match decision {
                Ok(ApprovalDecision::Approve) => GateOutcome::Approved,
                Ok(ApprovalDecision::Reject) => GateOutcome::Rejected,
                Err(_) => GateOutcome::Cancelled,
            },
            _ = deadline => GateOutcome::TimedOut,
            _ = cancel.cancelled() => GateOutcome::Cancelled,
        }
    }
}

impl Drop for PendingApproval<'_> {
    fn drop(&mut self) {
        self.gate.pending.remove(&self.key);
    }
}
