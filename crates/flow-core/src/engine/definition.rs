//! Definición declarativa de un workflow y su builder.
//!
//! Una sola definición parametrizada sirve para todos los entornos: las
//! diferencias (namespace, réplicas, aprobación) entran por el
//! `ExecutionContext`, no por copias del workflow.
//!
//! ```ignore
//! let def = WorkflowDefinition::builder("deploy")
//!     .step(Step::new("plan", plan_action))
//!     .step(Step::new("apply", apply_action).requiring_approval())
//!     .build()?;
//! ```

use std::collections::HashSet;

use crate::errors::CoreEngineError;
use crate::step::Step;

/// Definición inmutable del workflow: pasos en orden estricto.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    name: String,
    steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// Valida que haya al menos un step y que los ids sean únicos.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, CoreEngineError> {
        let name = name.into();
        let invalid = |reason: String| CoreEngineError::InvalidWorkflow { name: name.clone(),
                                                                           reason };
        if steps.is_empty() {
            return Err(invalid("a workflow needs at least one step".into()));
        }
        {
            let mut seen = HashSet::new();
            for s in &steps {
                if s.id.trim().is_empty() {
                    return Err(invalid("step ids must not be empty".into()));
                }
                if !seen.insert(s.id.as_str()) {
                    return Err(invalid(format!("duplicate step id '{}'", s.id)));
                }
            }
        }
        Ok(Self { name, steps })
    }

    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder { name: name.into(),
                          steps: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Acumula steps en orden y valida al construir.
#[derive(Debug)]
pub struct WorkflowBuilder {
    name: String,
    steps: Vec<Step>,
}

impl WorkflowBuilder {
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Result<WorkflowDefinition, CoreEngineError> {
        WorkflowDefinition::new(self.name, self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: &str) -> Step {
        Step::from_fn(id, |_| Ok(String::new()))
    }

    #[test]
    fn builder_keeps_declared_order() {
        let def = WorkflowDefinition::builder("deploy").step(noop("validate"))
                                                       .step(noop("apply"))
                                                       .step(noop("notify"))
                                                       .build()
                                                       .expect("valid");
        assert_eq!(def.step_ids(), vec!["validate", "apply", "notify"]);
        assert_eq!(def.name(), "deploy");
        assert_eq!(def.steps().len(), 3);
        assert_eq!(def.steps()[1].id, "apply");
    }

    #[test]
    fn duplicate_and_empty_definitions_rejected() {
        let dup = WorkflowDefinition::builder("deploy").step(noop("a")).step(noop("a")).build();
        assert!(matches!(dup, Err(CoreEngineError::InvalidWorkflow { .. })));
        assert!(WorkflowDefinition::builder("empty").build().is_err());
    }
}
