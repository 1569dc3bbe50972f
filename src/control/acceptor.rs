//! Control channel acceptor.
//!
//! # Responsibilities
//! - Bind the control address the legacy store dials
//! - Announce readiness once bound, before blocking on accept
//! - Accept exactly one connection within a bounded wait
//!
//! # Design Decisions
//! - Single-connection model: the listener is consumed by the accept and
//!   dropped afterwards, so no second store can ever connect

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::config::ReadySignalKind;
use crate::lifecycle::fatal::FatalError;

/// How readiness is announced after the control listener binds.
#[derive(Debug)]
pub enum ReadySignal {
    /// Detach stdout so an orchestrator waiting on it can start the store.
    CloseStdout,
    /// Send the bound address to an in-process waiter.
    Notify(oneshot::Sender<SocketAddr>),
    /// Announce nothing.
    Silent,
}

impl From<ReadySignalKind> for ReadySignal {
    fn from(kind: ReadySignalKind) -> Self {
        match kind {
            ReadySignalKind::CloseStdout => ReadySignal::CloseStdout,
            ReadySignalKind::None => ReadySignal::Silent,
        }
    }
}

impl ReadySignal {
    fn fire(self, addr: SocketAddr) -> Result<(), FatalError> {
        match self {
            ReadySignal::CloseStdout => detach_stdout().map_err(FatalError::Ready),
            ReadySignal::Notify(tx) => {
                let _ = tx.send(addr);
                Ok(())
            }
            ReadySignal::Silent => Ok(()),
        }
    }
}

/// Point stdout at `/dev/null`.
///
/// A parent reading our stdout sees EOF, and fd 1 stays occupied so the
/// next socket cannot land on it.
#[cfg(unix)]
fn detach_stdout() -> std::io::Result<()> {
    use std::io::Write;

    std::io::stdout().flush()?;
    let null = std::fs::OpenOptions::new().write(true).open("/dev/null")?;
    rustix::stdio::dup2_stdout(&null)?;
    Ok(())
}

#[cfg(not(unix))]
fn detach_stdout() -> std::io::Result<()> {
    use std::io::Write;
    std::io::stdout().flush()
}

/// Listener waiting for the legacy store's single connection.
pub struct ControlAcceptor {
    inner: TcpListener,
}

impl ControlAcceptor {
    /// Bind the control address.
    pub async fn bind(addr: &str) -> Result<Self, FatalError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| FatalError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { inner: listener })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Announce readiness, then accept one connection within `wait`.
    ///
    /// Consumes the acceptor; the listener is closed once this returns.
    pub async fn accept_one(
        self,
        ready: ReadySignal,
        wait: Duration,
    ) -> Result<(TcpStream, SocketAddr), FatalError> {
        let local = self.local_addr().map_err(|source| FatalError::Bind {
            addr: "control listener".to_string(),
            source,
        })?;
        tracing::info!(address = %local, "Listening for connection from legacy store");

        ready.fire(local)?;

        let (stream, peer) = match tokio::time::timeout(wait, self.inner.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(FatalError::Accept(e)),
            Err(_) => return Err(FatalError::AcceptTimeout(wait)),
        };

        tracing::info!(peer_addr = %peer, "Legacy store connected");
        Ok((stream, peer))
    }
}
