pub mod notify;
pub mod readiness;
pub mod shell;
