//! Step Executor: ejecuta exactamente un intento de una acción.
//!
//! Es la frontera de fallos del motor: errores de la acción, pánicos y
//! timeouts se convierten en un `StepResult` con `status = Failed`.

use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use super::{Step, StepResult};
use crate::model::ExecutionContext;

#[derive(Debug, Clone, Default)]
pub struct StepExecutor {
    attempt_timeout: Option<Duration>,
}

impl StepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiempo máximo por intento. Sin valor, un intento puede bloquear
    /// indefinidamente (p. ej. esperando a que el cluster esté listo).
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> StepResult {
        let started_at = Utc::now();
        debug!("executing step '{}' attempt {} ({})",
               step.id,
               ctx.attempt,
               step.action.describe(ctx));

        // La acción corre en su propia tarea: un pánico queda contenido en el
        // JoinError en lugar de tumbar el run.
        let action = step.action.clone();
        let task_ctx = ctx.clone();
        let handle = tokio::spawn(async move { action.execute(&task_ctx).await });
        let abort = handle.abort_handle();

        let joined = match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(j) => j,
                Err(_) => {
                    abort.abort();
                    warn!("step '{}' attempt {} timed out after {:?}", step.id, ctx.attempt, limit);
                    return StepResult::failed(&step.id,
                                              format!("timed out after {}s", limit.as_secs_f64()),
                                              String::new(),
                                              started_at);
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(output)) => StepResult::success(&step.id, output, started_at),
            Ok(Err(e)) => {
                warn!("step '{}' attempt {} failed: {}", step.id, ctx.attempt, e.message);
                StepResult::failed(&step.id, e.message, e.output, started_at)
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "action panicked".to_string()
                } else {
                    format!("action aborted: {join_err}")
                };
                warn!("step '{}' attempt {}: {}", step.id, ctx.attempt, reason);
                StepResult::failed(&step.id, reason, String::new(), started_at)
            }
        }
    }
}
