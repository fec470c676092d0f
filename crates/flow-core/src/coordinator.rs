//! Run Coordinator: una ejecución activa por entorno.
//!
//! El registro de entornos y la definición del workflow se inyectan en la
//! construcción. La exclusión mutua es por nombre de entorno (entrada de un
//! `DashMap`), nunca global: runs de entornos distintos avanzan en paralelo.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{info, warn};
use tokio::sync::watch;
use uuid::Uuid;

use crate::cancel::CancellationFlag;
use crate::engine::{WorkflowDefinition, WorkflowEngine};
use crate::environment::EnvironmentRegistry;
use crate::errors::CoreEngineError;
use crate::gate::ApprovalDecision;
use crate::repo::WorkflowRun;

/// Referencia devuelta por `trigger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub environment: String,
}

struct RunEntry {
    cancel: CancellationFlag,
    done: watch::Receiver<Option<WorkflowRun>>,
}

pub struct RunCoordinator {
    registry: Arc<EnvironmentRegistry>,
    definition: WorkflowDefinition,
    engine: Arc<WorkflowEngine>,
    active: DashMap<String, Uuid>,
    runs: DashMap<Uuid, RunEntry>,
}

impl RunCoordinator {
    pub fn new(registry: Arc<EnvironmentRegistry>, definition: WorkflowDefinition) -> Self {
        Self::with_engine(registry, definition, Arc::new(WorkflowEngine::new()))
    }

    pub fn with_engine(registry: Arc<EnvironmentRegistry>,
                       definition: WorkflowDefinition,
                       engine: Arc<WorkflowEngine>)
                       -> Self {
        Self { registry,
               definition,
               engine,
               active: DashMap::new(),
               runs: DashMap::new() }
    }

    pub fn registry(&self) -> &EnvironmentRegistry {
        &self.registry
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    /// Arranca un run para `environment` en una tarea de tokio.
    ///
    /// Falla con `UnknownEnvironment` (sin crear run) o con `RunInProgress`
    /// si el run previo de ese entorno no ha terminado.
    pub fn trigger(&self, environment: &str) -> Result<RunHandle, CoreEngineError> {
        let env = self.registry.lookup(environment)?.clone();
        let run_id = Uuid::new_v4();

        // La entrada queda bloqueada mientras decidimos: dos triggers
        // concurrentes del mismo entorno no pueden pasar ambos.
        match self.active.entry(env.name.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = *occupied.get();
                if !self.engine.snapshot(previous).is_terminal() {
                    warn!("trigger rejected: run {previous} still active for '{}'", env.name);
                    return Err(CoreEngineError::RunInProgress(env.name.clone()));
                }
                occupied.insert(run_id);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(run_id);
            }
        }

        self.engine.initialize(run_id, &env, &self.definition);
        let cancel = CancellationFlag::new();
        let (done_tx, done_rx) = watch::channel(None);
        self.runs.insert(run_id,
                         RunEntry { cancel: cancel.clone(),
                                    done: done_rx });

        let engine = self.engine.clone();
        let definition = self.definition.clone();
        let task_env = env.clone();
        tokio::spawn(async move {
            let run = engine.execute(run_id, &task_env, &definition, &cancel).await;
            info!("run {run_id} for '{}' finished: {}",
                  task_env.name,
                  run.overall_status.as_str());
            done_tx.send_replace(Some(run));
        });

        info!("triggered run {run_id} for environment '{}'", env.name);
        Ok(RunHandle { run_id,
                       environment: env.name })
    }

    /// Snapshot del run: estado global, step actual y resultados ordenados.
    pub fn status(&self, run_id: Uuid) -> Result<WorkflowRun, CoreEngineError> {
        if !self.runs.contains_key(&run_id) {
            return Err(CoreEngineError::UnknownRun(run_id));
        }
        Ok(self.engine.snapshot(run_id))
    }

    /// Resuelve el gate de aprobación pendiente de `step_id`.
    pub fn resolve(&self, run_id: Uuid, step_id: &str, decision: ApprovalDecision) -> Result<(), CoreEngineError> {
        if !self.runs.contains_key(&run_id) {
            return Err(CoreEngineError::UnknownRun(run_id));
        }
        self.engine.gate().resolve(run_id, step_id, decision)
    }

    /// Solicita la cancelación. Se aplica en la siguiente frontera de step;
    /// sobre un run terminal no tiene efecto.
    pub fn cancel(&self, run_id: Uuid) -> Result<(), CoreEngineError> {
        let entry = self.runs.get(&run_id).ok_or(CoreEngineError::UnknownRun(run_id))?;
        if self.engine.snapshot(run_id).is_terminal() {
            return Ok(());
        }
        if !entry.cancel.is_cancelled() {
            // Primero la señal: el engine la consulta antes de cerrar el run.
            entry.cancel.cancel();
            self.engine.record_cancellation(run_id);
        }
        Ok(())
    }

    /// Espera a que el run alcance un estado terminal.
    pub async fn wait(&self, run_id: Uuid) -> Result<WorkflowRun, CoreEngineError> {
        let mut rx = self.runs
                         .get(&run_id)
                         .map(|e| e.done.clone())
                         .ok_or(CoreEngineError::UnknownRun(run_id))?;
        let done = rx.wait_for(|r| r.is_some())
                     .await
                     .map_err(|_| CoreEngineError::Internal(format!("run {run_id} task ended without a result")))?;
        (*done).clone()
               .ok_or_else(|| CoreEngineError::Internal(format!("run {run_id} has no final snapshot")))
    }

    /// Run activo (no terminal) de un entorno, si lo hay.
    pub fn active_run(&self, environment: &str) -> Option<Uuid> {
        let run_id = *self.active.get(environment)?;
        (!self.engine.snapshot(run_id).is_terminal()).then_some(run_id)
    }

    /// Todos los runs lanzados por este coordinador.
    pub fn runs(&self) -> Vec<WorkflowRun> {
        self.runs.iter().map(|e| self.engine.snapshot(*e.key())).collect()
    }

    /// Olvida los runs terminados: su entrada, su reserva de entorno y sus
    /// eventos. Sin esto el coordinador y el store crecen con cada run.
    /// Devuelve cuántos se han purgado.
    pub fn prune_finished(&self) -> usize {
        let finished: Vec<(Uuid, Option<String>)> =
            self.runs
                .iter()
                .filter(|e| e.done.borrow().is_some())
                .map(|e| {
                    let env = e.done.borrow().as_ref().and_then(|r| r.environment.as_ref()).map(|c| c.name.clone());
                    (*e.key(), env)
                })
                .collect();

        for (run_id, env) in &finished {
            self.runs.remove(run_id);
            if let Some(env) = env {
                self.active.remove_if(env, |_, active| active == run_id);
            }
            self.engine.forget(*run_id);
        }
        if !finished.is_empty() {
            info!("pruned {} finished run(s)", finished.len());
        }
        finished.len()
    }
}
