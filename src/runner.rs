//! Seguimiento de un run lanzado desde la CLI.
//!
//! `drive` observa el run hasta su estado terminal, contesta los gates de
//! aprobación (decisión fija o respuesta del operador) y convierte una
//! interrupción en cancelación. La pregunta al operador nunca bloquea el
//! bucle: si el gate vence o el run se cancela mientras se espera la
//! respuesta, `drive` termina igualmente.
use std::future::Future;
use std::io::{BufRead, Write};
use std::time::Duration;

use flow_core::{ApprovalDecision, RunCoordinator, RunStatus, WorkflowRun};
use log::{info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::AppError;

pub const STATUS_POLL: Duration = Duration::from_millis(200);

/// Origen de las decisiones de aprobación.
pub enum Approvals {
    /// Misma decisión para cualquier gate (`--approve` / `--reject`).
    Fixed(ApprovalDecision),
    /// Una línea por gate; el canal cerrado equivale a rechazar.
    Interactive(mpsc::UnboundedReceiver<String>),
}

impl Approvals {
    /// Lee stdin en un hilo propio: una lectura pendiente no retiene el
    /// runtime cuando el run termina sin respuesta.
    pub fn from_stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Approvals::Interactive(rx)
    }

    async fn next_answer(&mut self) -> Option<String> {
        match self {
            Approvals::Interactive(rx) => rx.recv().await,
            Approvals::Fixed(_) => std::future::pending().await,
        }
    }
}

/// `y`/`yes` aprueba; cualquier otra cosa (o fin de entrada) rechaza.
pub fn parse_answer(line: Option<&str>) -> ApprovalDecision {
    match line.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
        Some("y") | Some("yes") => ApprovalDecision::Approve,
        _ => ApprovalDecision::Reject,
    }
}

pub async fn drive<I>(coordinator: &RunCoordinator,
                      run_id: Uuid,
                      approvals: &mut Approvals,
                      interrupt: I)
                      -> Result<WorkflowRun, AppError>
    where I: Future<Output = ()>
{
    let mut ticker = tokio::time::interval(STATUS_POLL);
    tokio::pin!(interrupt);
    let mut interrupted = false;
    // Gate cuya pregunta está en pantalla.
    let mut asking: Option<String> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                warn!("interrupt received, cancelling run {run_id}");
                coordinator.cancel(run_id)?;
            }
            line = approvals.next_answer(), if asking.is_some() => {
                if let Some(step_id) = asking.take() {
                    apply(coordinator, run_id, &step_id, parse_answer(line.as_deref()));
                }
            }
        }

        let snapshot = coordinator.status(run_id)?;
        if snapshot.is_terminal() {
            if asking.take().is_some() {
                println!();
            }
            return Ok(coordinator.wait(run_id).await?);
        }

        match pending_gate(coordinator, &snapshot) {
            None => {
                if let Some(step_id) = asking.take() {
                    println!();
                    warn!("approval for '{step_id}' is no longer pending");
                }
            }
            Some(step_id) if asking.as_deref() == Some(step_id.as_str()) => {}
            Some(step_id) => match approvals {
                Approvals::Fixed(decision) => apply(coordinator, run_id, &step_id, *decision),
                Approvals::Interactive(_) => {
                    ask(&snapshot, &step_id)?;
                    asking = Some(step_id);
                }
            },
        }
    }
}

fn pending_gate(coordinator: &RunCoordinator, run: &WorkflowRun) -> Option<String> {
    if run.overall_status != RunStatus::AwaitingApproval {
        return None;
    }
    let step_id = run.current_step_id.clone()?;
    coordinator.engine().gate().is_pending(run.run_id, &step_id).then_some(step_id)
}

fn apply(coordinator: &RunCoordinator, run_id: Uuid, step_id: &str, decision: ApprovalDecision) {
    info!("run {run_id}: step '{step_id}' {}",
          match decision {
              ApprovalDecision::Approve => "approved",
              ApprovalDecision::Reject => "rejected",
          });
    // El gate puede haberse cerrado entretanto (timeout o cancelación).
    if let Err(e) = coordinator.resolve(run_id, step_id, decision) {
        warn!("decision for '{step_id}' not applied: {e}");
    }
}

fn ask(run: &WorkflowRun, step_id: &str) -> Result<(), AppError> {
    let (env, namespace) = run.environment
                              .as_ref()
                              .map(|e| (e.name.as_str(), e.namespace.as_str()))
                              .unwrap_or(("?", "?"));
    let mut stdout = std::io::stdout();
    write!(stdout,
           "Approve step '{step_id}' of '{}' in {env} ({namespace})? [y/N] ",
           run.workflow)?;
    stdout.flush()?;
    Ok(())
}
