//! Orderly stop of the HTTP front end.
//!
//! Only operator-initiated stops come through here. Losing the legacy
//! connection is a crash, handled by [`crate::lifecycle::fatal`].

use tokio::sync::broadcast;

/// Tells the HTTP server to stop accepting requests and finish in-flight ones.
///
/// `main` and the integration tests hold one; the server holds a receiver
/// from [`Shutdown::subscribe`].
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver to hand to [`crate::http::HttpServer::run`] or `run_tls`.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop serving. A no-op if the server has already gone.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Stop serving when the operator presses Ctrl+C.
    pub fn trigger_on_ctrl_c(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Interrupted, stopping HTTP server");
                    let _ = tx.send(());
                }
                Err(e) => tracing::warn!(error = %e, "Failed to install Ctrl+C handler"),
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
