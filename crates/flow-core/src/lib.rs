//! flow-core: motor lineal de workflows de despliegue.
//!
//! Componentes (de hoja a raíz): registro de entornos, executor de steps,
//! política de reintentos, gate de aprobación, engine y coordinador de runs.
//! Todo el estado observable de un run se reconstruye a partir de su
//! secuencia de eventos.
pub mod cancel;
pub mod constants;
pub mod coordinator;
pub mod engine;
pub mod environment;
pub mod errors;
pub mod event;
pub mod gate;
pub mod model;
pub mod repo;
pub mod retry;
pub mod step;

pub use cancel::CancellationFlag;
pub use coordinator::{RunCoordinator, RunHandle};
pub use engine::{WorkflowBuilder, WorkflowDefinition, WorkflowEngine};
pub use environment::{EnvironmentConfig, EnvironmentRegistry, ResourceTier};
pub use errors::CoreEngineError;
pub use event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
pub use gate::{ApprovalDecision, ApprovalGate, GateOutcome};
pub use model::ExecutionContext;
pub use repo::{FailureReason, InMemoryRunRepository, RunRepository, RunStatus, WorkflowRun};
pub use retry::{run_with_retry, Backoff, RetryPolicy};
pub use step::{ActionError, FnAction, Step, StepAction, StepExecutor, StepResult, StepStatus};

