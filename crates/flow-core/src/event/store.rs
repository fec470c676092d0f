use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{RunEvent, RunEventKind};

/// Almacenamiento de eventos append-only, compartido entre el engine (que
/// escribe) y el coordinador (que lee snapshots).
pub trait EventStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con
    /// seq y ts).
    fn append_kind(&self, run_id: Uuid, kind: RunEventKind) -> RunEvent;
    /// Lista eventos de un run (orden ascendente por seq).
    fn list(&self, run_id: Uuid) -> Vec<RunEvent>;
    /// Runs conocidos por el store.
    fn run_ids(&self) -> Vec<Uuid>;
    /// Elimina los eventos de un run y los devuelve.
    fn remove(&self, run_id: Uuid) -> Vec<RunEvent>;
}

/// Store en memoria. Crece con cada run: un proceso de larga duración debe
/// purgar los runs terminados (`RunCoordinator::prune_finished`).
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<RunEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, run_id: Uuid, kind: RunEventKind) -> RunEvent {
        let mut events = self.inner.entry(run_id).or_default();
        let seq = events.len() as u64;
        let ev = RunEvent { seq,
                            run_id,
                            kind,
                            ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.inner.get(&run_id).map(|e| e.value().clone()).unwrap_or_default()
    }

    fn run_ids(&self) -> Vec<Uuid> {
        self.inner.iter().map(|e| *e.key()).collect()
    }

    fn remove(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.inner.remove(&run_id).map(|(_, events)| events).unwrap_or_default()
    }
}
