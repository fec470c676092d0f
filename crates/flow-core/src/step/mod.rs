//! Definiciones relacionadas a Steps.
//!
//! Un Step es una unidad de trabajo externa dentro de un workflow. Este módulo
//! define:
//! - `StepAction`: la única capacidad (`execute`) que implementan las acciones.
//! - `Step`: acción + política de reintento + flags de aprobación/idempotencia.
//! - `StepExecutor`: ejecuta un intento y convierte cualquier fallo en
//!   `StepResult`.

pub mod definition;
pub mod executor;
mod result;
mod status;

pub use definition::{ActionError, FnAction, Step, StepAction};
pub use executor::StepExecutor;
pub use result::StepResult;
pub use status::StepStatus;
