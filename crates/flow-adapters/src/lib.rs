//! flow-adapters: acciones concretas para los steps de `flow-core`.
//!
//! El core sólo conoce `StepAction`; aquí viven las implementaciones que
//! tocan el mundo exterior:
//! - `ShellAction`: plantilla de comando ejecutada con `sh -c`, con las
//!   variables del entorno resuelto exportadas.
//! - `PollUntilReady`: reintenta una acción de comprobación con intervalo y
//!   plazo acotados (verificación de rollout).
//! - `NotifyAction`: envía un mensaje a un `Notifier` inyectable.

pub mod actions;

pub use actions::notify::{LogNotifier, Notification, NotifyAction, Notifier};
pub use actions::readiness::PollUntilReady;
pub use actions::shell::ShellAction;
