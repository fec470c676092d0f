//! Comprobación de disponibilidad con sondeo acotado.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flow_core::{ActionError, ExecutionContext, StepAction};
use log::debug;
use tokio::time::{sleep, Instant};

/// Ejecuta `check` hasta que tenga éxito o se agote `timeout`, esperando
/// `interval` entre sondeos. Todo el sondeo cuenta como un único intento del
/// step; la política de reintentos del step se aplica por encima.
pub struct PollUntilReady {
    check: Arc<dyn StepAction>,
    interval: Duration,
    timeout: Duration,
}

impl PollUntilReady {
    pub fn new(check: impl StepAction + 'static, interval: Duration, timeout: Duration) -> Self {
        Self { check: Arc::new(check),
               interval,
               timeout }
    }
}

#[async_trait]
impl StepAction for PollUntilReady {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        format!("poll every {}s (max {}s): {}",
                self.interval.as_secs(),
                self.timeout.as_secs(),
                self.check.describe(ctx))
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, ActionError> {
        let deadline = Instant::now() + self.timeout;
        let mut checks = 0u32;
        loop {
            checks += 1;
            match self.check.execute(ctx).await {
                Ok(out) => {
                    debug!("[{}] ready after {checks} check(s)", ctx.step_id);
                    return Ok(out);
                }
                Err(err) => {
                    if Instant::now() + self.interval > deadline {
                        return Err(ActionError::new(format!("not ready after {}s ({checks} checks): {}",
                                                            self.timeout.as_secs(),
                                                            err.message)).with_output(err.output));
                    }
                    debug!("[{}] check {checks} not ready: {}", ctx.step_id, err.message);
                    sleep(self.interval).await;
                }
            }
        }
    }
}
