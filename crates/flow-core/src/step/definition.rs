use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::ExecutionContext;
use crate::retry::RetryPolicy;

/// Fallo reportado por una acción. `output` conserva lo capturado hasta el
/// fallo (stdout/stderr o equivalente).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub message: String,
    pub output: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(),
               output: String::new() }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionError {}

/// Unidad de trabajo opaca que el engine invoca. Cada llamada a `execute`
/// corresponde a exactamente un intento.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Descripción legible (comando renderizado, destino, ...).
    fn describe(&self, _ctx: &ExecutionContext) -> String {
        "opaque action".to_string()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, ActionError>;
}

/// Adaptador para usar una función síncrona como acción.
pub struct FnAction<F> {
    label: String,
    f: F,
}

impl<F> FnAction<F> where F: Fn(&ExecutionContext) -> Result<String, ActionError> + Send + Sync
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self { label: label.into(), f }
    }
}

#[async_trait]
impl<F> StepAction for FnAction<F> where F: Fn(&ExecutionContext) -> Result<String, ActionError> + Send + Sync
{
    fn describe(&self, _ctx: &ExecutionContext) -> String {
        self.label.clone()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, ActionError> {
        (self.f)(ctx)
    }
}

/// Step de un workflow. Propiedad exclusiva de su `WorkflowDefinition`.
#[derive(Clone)]
pub struct Step {
    pub id: String,
    pub action: Arc<dyn StepAction>,
    pub retry: Option<RetryPolicy>,
    pub requires_approval: bool,
    /// Los steps no idempotentes nunca se reintentan.
    pub idempotent: bool,
}

impl Step {
    pub fn new(id: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self::from_arc(id, Arc::new(action))
    }

    pub fn from_arc(id: impl Into<String>, action: Arc<dyn StepAction>) -> Self {
        Self { id: id.into(),
               action,
               retry: None,
               requires_approval: false,
               idempotent: true }
    }

    /// Atajo para acciones definidas como closure.
    pub fn from_fn<F>(id: impl Into<String>, f: F) -> Self
        where F: Fn(&ExecutionContext) -> Result<String, ActionError> + Send + Sync + 'static
    {
        let id = id.into();
        let label = id.clone();
        Self::new(id, FnAction::new(label, f))
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Política efectiva: sin política o no idempotente => un solo intento.
    pub fn effective_retry(&self) -> RetryPolicy {
        match (&self.retry, self.idempotent) {
            (Some(p), true) => p.clone(),
            _ => RetryPolicy::none(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
         .field("id", &self.id)
         .field("retry", &self.retry)
         .field("requires_approval", &self.requires_approval)
         .field("idempotent", &self.idempotent)
         .finish_non_exhaustive()
    }
}
