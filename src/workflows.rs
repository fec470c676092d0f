//! Catálogo de workflows de despliegue y mantenimiento de AWX.
//!
//! Cada workflow es una única definición parametrizada por entorno: el
//! namespace, las réplicas y el tier llegan en tiempo de ejecución a través
//! de `${NAMESPACE}`, `${REPLICAS}`, ... en las plantillas de comando.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use flow_adapters::{NotifyAction, Notifier, PollUntilReady, ShellAction};
use flow_core::{ApprovalGate, CoreEngineError, EnvironmentConfig, ExecutionContext, Step, WorkflowDefinition};
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;

pub const ROLLOUT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const ROLLOUT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkflowKind {
    /// Namespace, operador, instancia (con aprobación), rollout y aviso.
    Deploy,
    /// Un único `kubectl apply` del directorio de manifiestos.
    ApplyManifests,
    /// Backup, health check, limpieza y revisión del operador.
    Maintenance,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Deploy => "deploy",
            WorkflowKind::ApplyManifests => "apply-manifests",
            WorkflowKind::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn build(kind: WorkflowKind,
             config: &AppConfig,
             notifier: Arc<dyn Notifier>)
             -> Result<WorkflowDefinition, CoreEngineError> {
    match kind {
        WorkflowKind::Deploy => deploy(config, notifier),
        WorkflowKind::ApplyManifests => apply_manifests(config),
        WorkflowKind::Maintenance => maintenance(config),
    }
}

fn path(p: &Path) -> String {
    p.display().to_string()
}

pub fn deploy(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<WorkflowDefinition, CoreEngineError> {
    let operator_dir = config.manifest_dir.join("aks-operator");
    let retry = config.retry.clone();

    let rollout_check = ShellAction::new("kubectl rollout status deployment/awx-web -n ${NAMESPACE} --timeout=30s");

    WorkflowDefinition::builder("deploy").step(Step::new("ensure_namespace",
                                                         ShellAction::new("kubectl get ns ${NAMESPACE} || kubectl create ns ${NAMESPACE}"))
                                                   .with_retry(retry.clone()))
                                         .step(Step::new("apply_operator",
                                                         ShellAction::new(format!("kubectl apply -f {}/awx-operator.yaml -n ${{NAMESPACE}}",
                                                                                  path(&operator_dir))))
                                                   .with_retry(retry.clone()))
                                         .step(Step::new("apply_instance",
                                                         ShellAction::new(format!("envsubst < {}/awx-instance.yaml | kubectl apply -f - -n ${{NAMESPACE}}",
                                                                                  path(&operator_dir))).with_env("AWX_NAMESPACE", "${NAMESPACE}")
                                                                                                       .with_env("AWX_REPLICAS", "${REPLICAS}"))
                                                   .with_retry(retry.clone())
                                                   .requiring_approval())
                                         .step(Step::new("verify_rollout",
                                                         PollUntilReady::new(rollout_check, ROLLOUT_POLL_INTERVAL, ROLLOUT_TIMEOUT))
                                                   .with_retry(retry))
                                         .step(Step::new("notify",
                                                         NotifyAction::new(notifier,
                                                                           "AWX deployed to ${ENVIRONMENT} (namespace ${NAMESPACE}, ${REPLICAS} replica(s), tier ${RESOURCE_TIER})")))
                                         .build()
}

/// Variante mínima: sin reintentos ni aprobación.
pub fn apply_manifests(config: &AppConfig) -> Result<WorkflowDefinition, CoreEngineError> {
    let dir = config.manifest_dir.join("manifests");
    WorkflowDefinition::builder("apply-manifests").step(Step::new("apply",
                                                                  ShellAction::new(format!("kubectl apply -f {}/ -n ${{NAMESPACE}}",
                                                                                           path(&dir)))))
                                                  .build()
}

pub fn maintenance(config: &AppConfig) -> Result<WorkflowDefinition, CoreEngineError> {
    let backups = path(&config.backup_dir);
    let retry = config.retry.clone();

    let backup = format!("mkdir -p {backups} && \
                          kubectl get secret -n ${{NAMESPACE}} -o yaml > {backups}/awx-${{ENVIRONMENT}}-secrets-$(date +%Y%m%d).yaml && \
                          kubectl get configmap -n ${{NAMESPACE}} -o yaml > {backups}/awx-${{ENVIRONMENT}}-configmaps-$(date +%Y%m%d).yaml");
    let cleanup = format!("kubectl delete jobs -n ${{NAMESPACE}} --field-selector status.successful=1 --ignore-not-found=true && \
                           find {backups} -name \"awx-${{ENVIRONMENT}}-*-$(date -d '7 days ago' +%Y%m%d).yaml\" -delete");

    WorkflowDefinition::builder("maintenance").step(Step::new("backup", ShellAction::new(backup)).with_retry(retry.clone()))
                                              .step(Step::new("health_check",
                                                              ShellAction::new("kubectl get pods -n ${NAMESPACE} && \
                                                                                (kubectl top pods -n ${NAMESPACE} || echo \"Metrics not available\")"))
                                                        .with_retry(retry.clone()))
                                              .step(Step::new("cleanup", ShellAction::new(cleanup)).with_retry(retry.clone()))
                                              .step(Step::new("update_operator",
                                                              ShellAction::new("kubectl get deployment awx-operator -n ${NAMESPACE} \
                                                                                -o jsonpath='{.spec.template.spec.containers[0].image}'"))
                                                        .with_retry(retry))
                                              .build()
}

/// Línea del comando `plan`: qué haría cada step sin ejecutar nada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub index: usize,
    pub step_id: String,
    pub action: String,
    pub gated: bool,
    pub max_attempts: u32,
}

pub fn plan(definition: &WorkflowDefinition, environment: &EnvironmentConfig) -> Vec<PlannedStep> {
    let run_id = Uuid::nil();
    definition.steps()
              .iter()
              .enumerate()
              .map(|(index, step)| {
                  let ctx = ExecutionContext::new(run_id, environment.clone(), &step.id);
                  PlannedStep { index: index + 1,
                                step_id: step.id.clone(),
                                action: step.action.describe(&ctx),
                                gated: ApprovalGate::applies(environment, step),
                                max_attempts: step.effective_retry().max_attempts }
              })
              .collect()
}
