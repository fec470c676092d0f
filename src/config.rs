//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone `AppConfig`, a
//! partir de la cual se construyen el registro de entornos y el engine.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use flow_core::{EnvironmentRegistry, RetryPolicy, StepExecutor, WorkflowEngine};
use log::{debug, info};
use once_cell::sync::Lazy;

use crate::errors::{AppError, ConfigError};

pub const ENV_ENVIRONMENTS_FILE: &str = "DEPLOYFLOW_ENVIRONMENTS_FILE";
pub const ENV_MANIFEST_DIR: &str = "DEPLOYFLOW_MANIFEST_DIR";
pub const ENV_BACKUP_DIR: &str = "DEPLOYFLOW_BACKUP_DIR";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "DEPLOYFLOW_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_DELAY_SECS: &str = "DEPLOYFLOW_RETRY_DELAY_SECS";
pub const ENV_APPROVAL_TIMEOUT_SECS: &str = "DEPLOYFLOW_APPROVAL_TIMEOUT_SECS";
pub const ENV_STEP_TIMEOUT_SECS: &str = "DEPLOYFLOW_STEP_TIMEOUT_SECS";

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Fichero JSON con el mapa de entornos; sin valor se usan los embebidos.
    pub environments_file: Option<PathBuf>,
    pub manifest_dir: PathBuf,
    pub backup_dir: PathBuf,
    /// Política aplicada a los steps reintentables del catálogo.
    pub retry: RetryPolicy,
    pub approval_timeout: Option<Duration>,
    pub step_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { environments_file: None,
               manifest_dir: PathBuf::from("/opt/deployflow"),
               backup_dir: PathBuf::from("/tmp"),
               retry: RetryPolicy::default(),
               approval_timeout: None,
               step_timeout: None }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_attempts = parse::<u32>(ENV_RETRY_MAX_ATTEMPTS, get(ENV_RETRY_MAX_ATTEMPTS))?.unwrap_or(defaults.retry.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue { key: ENV_RETRY_MAX_ATTEMPTS.into(),
                                                   value: "0".into(),
                                                   reason: "at least one attempt is required".into() });
        }
        let retry = match parse::<u64>(ENV_RETRY_DELAY_SECS, get(ENV_RETRY_DELAY_SECS))? {
            Some(secs) => RetryPolicy::fixed(max_attempts, Duration::from_secs(secs)),
            None => RetryPolicy::new(max_attempts, defaults.retry.backoff),
        };

        Ok(Self { environments_file: get(ENV_ENVIRONMENTS_FILE).map(PathBuf::from),
                  manifest_dir: get(ENV_MANIFEST_DIR).map(PathBuf::from).unwrap_or(defaults.manifest_dir),
                  backup_dir: get(ENV_BACKUP_DIR).map(PathBuf::from).unwrap_or(defaults.backup_dir),
                  retry,
                  approval_timeout: optional_secs(ENV_APPROVAL_TIMEOUT_SECS, get(ENV_APPROVAL_TIMEOUT_SECS))?,
                  step_timeout: optional_secs(ENV_STEP_TIMEOUT_SECS, get(ENV_STEP_TIMEOUT_SECS))? })
    }

    /// Registro de entornos: fichero configurado o los embebidos.
    pub fn load_registry(&self) -> Result<EnvironmentRegistry, AppError> {
        let Some(path) = &self.environments_file else {
            debug!("using embedded environments");
            return Ok(EnvironmentRegistry::builtin());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable { path: path.display().to_string(),
                                                                                       reason: e.to_string() })?;
        let registry = EnvironmentRegistry::from_json_str(&raw)?;
        info!("loaded {} environment(s) from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn engine(&self) -> WorkflowEngine {
        let mut executor = StepExecutor::new();
        if let Some(t) = self.step_timeout {
            executor = executor.with_attempt_timeout(t);
        }
        let engine = WorkflowEngine::new().with_executor(executor);
        match self.approval_timeout {
            Some(t) => engine.with_approval_timeout(t),
            None => engine,
        }
    }
}

fn parse<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError>
    where T: FromStr,
          T::Err: std::fmt::Display
{
    raw.map(|v| {
           v.parse::<T>().map_err(|e| ConfigError::InvalidValue { key: key.to_string(),
                                                                   value: v.clone(),
                                                                   reason: e.to_string() })
       })
       .transpose()
}

// 0 equivale a "sin límite".
fn optional_secs(key: &str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(key, raw)?.filter(|s| *s > 0).map(Duration::from_secs))
}
