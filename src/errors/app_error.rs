use flow_core::CoreEngineError;
use thiserror::Error;

use super::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] CoreEngineError),
    #[error("Error de configuración: {0}")]
    Config(#[from] ConfigError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error de serialización: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Código de salida del binario. Sólo los errores del motor tienen
    /// códigos propios (2 entorno desconocido, 3 run en curso).
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Engine(e) => e.exit_code(),
            _ => 1,
        }
    }
}
