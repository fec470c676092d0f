//! Notificaciones del workflow (equivalente al step final de los scripts de
//! despliegue). El destino real se inyecta con `Notifier`.

use std::sync::Arc;

use async_trait::async_trait;
use flow_core::{ActionError, ExecutionContext, StepAction};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub run_id: String,
    pub environment: String,
    pub step_id: String,
    pub message: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), ActionError>;
}

/// Escribe la notificación como JSON en el log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ActionError> {
        let payload = serde_json::to_string(notification).map_err(|e| ActionError::new(format!("encode notification: {e}")))?;
        info!("notification {payload}");
        Ok(())
    }
}

pub struct NotifyAction {
    notifier: Arc<dyn Notifier>,
    template: String,
}

impl NotifyAction {
    pub fn new(notifier: Arc<dyn Notifier>, template: impl Into<String>) -> Self {
        Self { notifier,
               template: template.into() }
    }

    pub fn to_log(template: impl Into<String>) -> Self {
        Self::new(Arc::new(LogNotifier), template)
    }
}

#[async_trait]
impl StepAction for NotifyAction {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        format!("notify: {}", ctx.render(&self.template))
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, ActionError> {
        let notification = Notification { run_id: ctx.run_id.to_string(),
                                          environment: ctx.environment.name.clone(),
                                          step_id: ctx.step_id.clone(),
                                          message: ctx.render(&self.template) };
        self.notifier.notify(&notification).await?;
        Ok(notification.message)
    }
}
