use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreEngineError;

/// Tamaño de recursos asignado a un entorno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTier {
    Small,
    Medium,
    Large,
}

impl ResourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTier::Small => "small",
            ResourceTier::Medium => "medium",
            ResourceTier::Large => "large",
        }
    }
}

impl fmt::Display for ResourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(ResourceTier::Small),
            "medium" => Ok(ResourceTier::Medium),
            "large" => Ok(ResourceTier::Large),
            other => Err(format!("unknown resource tier '{other}'")),
        }
    }
}

/// Configuración inmutable de un entorno de despliegue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub resource_tier: ResourceTier,
    pub approval_required: bool,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>,
               namespace: impl Into<String>,
               replicas: u32,
               resource_tier: ResourceTier,
               approval_required: bool)
               -> Self {
        Self { name: name.into(),
               namespace: namespace.into(),
               replicas,
               resource_tier,
               approval_required }
    }

    /// Comprueba las restricciones del modelo: nombre y namespace no vacíos,
    /// al menos una réplica.
    pub fn validate(&self) -> Result<(), CoreEngineError> {
        let invalid = |reason: &str| CoreEngineError::InvalidEnvironment { name: self.name.clone(),
                                                                           reason: reason.to_string() };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace must not be empty"));
        }
        if self.replicas == 0 {
            return Err(invalid("replicas must be a positive integer"));
        }
        Ok(())
    }
}
