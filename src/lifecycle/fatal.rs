//! Crash-only failure supervision.
//!
//! The bridge cannot run without its one legacy session, so any
//! infrastructure failure ends the process. Components never exit on their
//! own: they trip a [`FatalHandle`], and `main` waits on the [`Supervisor`]
//! and exits with [`FatalError::exit_code`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Every condition that ends the process.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("error reading password from {path}: {source}")]
    CredentialRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error removing password file {path}: {source}")]
    CredentialRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error listening on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("error signalling readiness: {0}")]
    Ready(std::io::Error),

    #[error("legacy store did not connect within {0:?}")]
    AcceptTimeout(Duration),

    #[error("error accepting legacy store connection: {0}")]
    Accept(std::io::Error),

    #[error("connection to legacy store died with error: {0}")]
    ControlRead(std::io::Error),

    #[error("connection to legacy store died peacefully")]
    ControlClosed,

    #[error("error sending query to legacy store: {0}")]
    ControlWrite(std::io::Error),

    #[error("query to legacy store not written within {0:?}")]
    WriteTimeout(Duration),

    #[error("error setting up TLS: {0}")]
    Tls(String),

    #[error("error writing fingerprint to {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error starting metrics exporter on {addr}: {message}")]
    Metrics { addr: SocketAddr, message: String },

    #[error("HTTP service error: {0}")]
    Serve(std::io::Error),
}

impl FatalError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::ControlWrite(_) | FatalError::WriteTimeout(_) => 3,
            _ => 1,
        }
    }
}

/// Create a linked handle/supervisor pair.
pub fn channel() -> (FatalHandle, Supervisor) {
    let (tx, rx) = mpsc::unbounded_channel();
    let tripped = Arc::new(AtomicBool::new(false));
    (
        FatalHandle {
            tx,
            tripped: Arc::clone(&tripped),
        },
        Supervisor { rx },
    )
}

/// Cloneable handle components use to report a fatal failure.
#[derive(Debug, Clone)]
pub struct FatalHandle {
    tx: mpsc::UnboundedSender<Arc<FatalError>>,
    tripped: Arc<AtomicBool>,
}

impl FatalHandle {
    /// Log and report a fatal failure. Returns the shared error so the caller
    /// can also surface it to whoever it is serving.
    pub fn trip(&self, error: FatalError) -> Arc<FatalError> {
        tracing::error!(error = %error, "Fatal bridge failure");
        let error = Arc::new(error);
        self.tripped.store(true, Ordering::SeqCst);
        let _ = self.tx.send(Arc::clone(&error));
        error
    }

    /// Whether any fatal failure has been reported.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

/// Receives the first fatal failure.
#[derive(Debug)]
pub struct Supervisor {
    rx: mpsc::UnboundedReceiver<Arc<FatalError>>,
}

impl Supervisor {
    /// Wait for the first fatal failure.
    ///
    /// Returns `None` once every handle has been dropped without tripping.
    pub async fn wait(mut self) -> Option<Arc<FatalError>> {
        self.rx.recv().await
    }
}
