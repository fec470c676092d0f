//! Política de reintentos.
//!
//! `run_with_retry` repite el intento mientras falle y queden intentos,
//! esperando `backoff.delay(n)` entre el intento `n` y el `n + 1`. El resultado
//! final es el del último intento con el contador acumulado.

use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_RETRY_DELAY};
use crate::model::ExecutionContext;
use crate::step::{Step, StepExecutor, StepResult};

/// Espera entre intentos. Todas las variantes son monótonas no decrecientes
/// en el número de intento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    None,
    Fixed { delay: Duration },
    Linear { base: Duration },
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Espera tras el intento fallido número `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let n = attempt.max(1);
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Linear { base } => base.saturating_mul(n),
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(n - 1);
                base.saturating_mul(factor).min(*max)
            }
        }
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base,
                               max: DEFAULT_MAX_BACKOFF }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS,
               backoff: Backoff::Fixed { delay: DEFAULT_RETRY_DELAY } }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts: max_attempts.max(1),
               backoff }
    }

    /// Un único intento, sin reintentos.
    pub fn none() -> Self {
        Self::new(1, Backoff::None)
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed { delay })
    }
}

/// Ejecuta `step` hasta `policy.max_attempts` veces.
///
/// `on_retry(result, next_attempt, delay)` se invoca antes de cada espera para
/// que el llamador pueda registrar el intento fallido.
pub async fn run_with_retry<F>(executor: &StepExecutor,
                               step: &Step,
                               ctx: &ExecutionContext,
                               policy: &RetryPolicy,
                               mut on_retry: F)
                               -> StepResult
    where F: FnMut(&StepResult, u32, Duration)
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let mut attempt_ctx = ctx.clone();
        attempt_ctx.attempt = attempt;
        let mut result = executor.execute(step, &attempt_ctx).await;
        result.attempts = attempt;
        if result.is_success() || attempt >= max_attempts {
            return result;
        }
        let delay = policy.backoff.delay(attempt);
        info!("step '{}' failed on attempt {}/{}; retrying in {:?}",
              step.id, attempt, max_attempts, delay);
        on_retry(&result, attempt + 1, delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
