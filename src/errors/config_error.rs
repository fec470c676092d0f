use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Valor inválido para {key}: '{value}' ({reason})")]
    InvalidValue { key: String, value: String, reason: String },
    #[error("No se pudo leer {path}: {reason}")]
    Unreadable { path: String, reason: String },
}
