//! Entornos de despliegue (namespace, escala y política de aprobación).

mod config;
mod registry;

pub use config::{EnvironmentConfig, ResourceTier};
pub use registry::EnvironmentRegistry;
