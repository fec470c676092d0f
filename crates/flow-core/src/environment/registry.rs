//! Registro de entornos.
//!
//! Se llena una sola vez al arrancar y después es de sólo lectura: no hay API
//! de mutación. Se inyecta explícitamente en el `RunCoordinator`.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::{EnvironmentConfig, ResourceTier};
use crate::errors::CoreEngineError;

/// Entrada del fichero de configuración: el nombre es la clave del mapa.
#[derive(Debug, Clone, Deserialize)]
struct EnvironmentEntry {
    namespace: String,
    replicas: u32,
    #[serde(default = "default_tier")]
    resource_tier: ResourceTier,
    #[serde(default)]
    approval_required: bool,
}

fn default_tier() -> ResourceTier {
    ResourceTier::Small
}

/// Documento completo en orden de aparición. Las claves repetidas se
/// conservan (un mapa las fusionaría) para que `from_configs` las rechace.
struct EnvironmentDocument(Vec<(String, EnvironmentEntry)>);

impl<'de> Deserialize<'de> for EnvironmentDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where D: Deserializer<'de>
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = EnvironmentDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of environment name to settings")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where A: MapAccess<'de>
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, entry)) = map.next_entry::<String, EnvironmentEntry>()? {
                    entries.push((name, entry));
                }
                Ok(EnvironmentDocument(entries))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    environments: IndexMap<String, EnvironmentConfig>,
}

impl EnvironmentRegistry {
    /// Construye el registro validando cada entrada y rechazando duplicados.
    pub fn from_configs<I>(configs: I) -> Result<Self, CoreEngineError>
        where I: IntoIterator<Item = EnvironmentConfig>
    {
        let mut environments = IndexMap::new();
        for cfg in configs {
            cfg.validate()?;
            if environments.contains_key(&cfg.name) {
                return Err(CoreEngineError::InvalidEnvironment { name: cfg.name.clone(),
                                                                 reason: "duplicate environment name".into() });
            }
            environments.insert(cfg.name.clone(), cfg);
        }
        Ok(Self { environments })
    }

    /// Carga un mapa JSON `nombre -> {namespace, replicas, resource_tier,
    /// approval_required}`. El orden del documento se conserva y un nombre
    /// repetido es un error.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreEngineError> {
        let EnvironmentDocument(entries) =
            serde_json::from_str(raw).map_err(|e| CoreEngineError::InvalidEnvironment { name: "<document>".into(),
                                                                                         reason: e.to_string() })?;
        Self::from_configs(entries.into_iter().map(|(name, e)| {
                                                   EnvironmentConfig { name,
                                                                       namespace: e.namespace,
                                                                       replicas: e.replicas,
                                                                       resource_tier: e.resource_tier,
                                                                       approval_required: e.approval_required }
                                               }))
    }

    /// Entornos embebidos: los tres destinos de los scripts de despliegue.
    pub fn builtin() -> Self {
        let configs = [EnvironmentConfig::new("dev", "awx-dev", 1, ResourceTier::Small, false),
                       EnvironmentConfig::new("nonprod", "awx-nonprod", 2, ResourceTier::Medium, false),
                       EnvironmentConfig::new("prod", "awx-prod", 3, ResourceTier::Large, true)];
        Self { environments: configs.into_iter().map(|c| (c.name.clone(), c)).collect() }
    }

    pub fn lookup(&self, name: &str) -> Result<&EnvironmentConfig, CoreEngineError> {
        self.environments
            .get(name)
            .ok_or_else(|| CoreEngineError::UnknownEnvironment(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentConfig> {
        self.environments.values()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
