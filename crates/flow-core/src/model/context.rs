use indexmap::IndexMap;
use uuid::Uuid;

use crate::environment::EnvironmentConfig;

/// Contexto de ejecución entregado a `StepAction::execute`.
///
/// Lleva el entorno resuelto y los outputs de los steps previos del mismo run
/// para poder sustituir plantillas (`${NAMESPACE}`, `${steps.plan.output}`).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub environment: EnvironmentConfig,
    pub step_id: String,
    pub attempt: u32,
    pub outputs: IndexMap<String, String>, // step_id -> output, en orden de ejecución
}

impl ExecutionContext {
    pub fn new(run_id: Uuid, environment: EnvironmentConfig, step_id: impl Into<String>) -> Self {
        Self { run_id,
               environment,
               step_id: step_id.into(),
               attempt: 1,
               outputs: IndexMap::new() }
    }

    pub fn with_outputs(mut self, outputs: IndexMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn output_of(&self, step_id: &str) -> Option<&str> {
        self.outputs.get(step_id).map(|s| s.as_str())
    }

    /// Variables de entorno que recibe un comando externo.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![("ENVIRONMENT".into(), self.environment.name.clone()),
             ("NAMESPACE".into(), self.environment.namespace.clone()),
             ("REPLICAS".into(), self.environment.replicas.to_string()),
             ("RESOURCE_TIER".into(), self.environment.resource_tier.to_string())]
    }

    /// Sustituye `${VAR}` y `${steps.<id>.output}`. Las referencias
    /// desconocidas se dejan intactas para que el comando falle de forma
    /// visible en lugar de ejecutarse con un valor vacío.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.lookup_var(key) {
                        Some(v) => out.push_str(&v),
                        None => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn lookup_var(&self, key: &str) -> Option<String> {
        if let Some(step) = key.strip_prefix("steps.").and_then(|k| k.strip_suffix(".output")) {
            return self.output_of(step).map(|s| s.trim().to_string());
        }
        match key {
            "RUN_ID" => Some(self.run_id.to_string()),
            "STEP_ID" => Some(self.step_id.clone()),
            "ATTEMPT" => Some(self.attempt.to_string()),
            _ => self.env_vars().into_iter().find(|(k, _)| k == key).map(|(_, v)| v),
        }
    }
}
