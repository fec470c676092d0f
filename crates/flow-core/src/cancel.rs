use std::sync::Arc;

use tokio::sync::watch;

/// Señal de cancelación compartida entre el llamador y el engine.
///
/// El engine sólo la consulta en fronteras de step y mientras espera un gate
/// de aprobación; nunca interrumpe un step en curso.
#[derive(Debug, Clone)]
pub struct CancellationFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Se completa cuando se solicita la cancelación.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // El emisor vive mientras viva `self`, así que `wait_for` sólo
        // termina cuando el valor pasa a `true`.
        let _ = rx.wait_for(|c| *c).await;
    }
}
