//! Bridge core: serialized queries against the legacy store.
//!
//! # Data Flow
//! ```text
//! fetch_secret(name)
//!     → lock session (one query in flight, ever)
//!     → discard leftovers of any timed-out query
//!     → write "<name>\n" (bounded by write timeout; failure is fatal)
//!     → drain line queue until "done"
//!     → classify (outcome.rs)
//! ```
//!
//! # Design Decisions
//! - The legacy protocol has no request IDs. Correct pairing of replies with
//!   queries relies on the store answering strictly in order, one at a time,
//!   and on the session lock keeping write+drain cycles from interleaving.
//! - Each cycle runs in its own task. A client that hangs up does not abandon
//!   the drain, so the queue never holds a half-consumed reply. The flip side
//!   is head-of-line blocking: a query the store never answers stalls every
//!   later request unless a drain timeout is configured.
//! - With a drain timeout, an abandoned cycle leaves an owed sentinel. The
//!   next cycle discards lines up to that sentinel before writing.

pub mod outcome;

pub use outcome::{OutcomeKind, ResponseOutcome};

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::config::ControlConfig;
use crate::lifecycle::fatal::{FatalError, FatalHandle};

/// Line the legacy store sends after the last line of every reply.
pub const SENTINEL: &str = "done";

/// Per-request failures. None of these end the process on their own; fatal
/// conditions have already been reported to the supervisor by the time a
/// [`BridgeError::Fatal`] is returned.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("secret name must not be empty")]
    EmptyName,

    #[error("secret name must not contain line breaks")]
    InvalidName,

    #[error("legacy store unavailable")]
    Unavailable,

    #[error("no reply from legacy store within {0:?}")]
    DrainTimeout(Duration),

    #[error("{0}")]
    Fatal(Arc<FatalError>),

    #[error("query task failed: {0}")]
    Task(String),
}

/// Timing knobs for the bridge.
#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    pub write_timeout: Duration,
    /// `None` waits for the sentinel indefinitely.
    pub drain_timeout: Option<Duration>,
}

impl From<&ControlConfig> for BridgeOptions {
    fn from(config: &ControlConfig) -> Self {
        Self {
            write_timeout: config.write_timeout(),
            drain_timeout: config.drain_timeout(),
        }
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::from(&ControlConfig::default())
    }
}

type ControlWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Everything guarded by the session lock.
struct Session {
    writer: ControlWriter,
    lines: mpsc::Receiver<String>,
    /// Sentinels still due from cycles that timed out.
    owed_sentinels: usize,
}

struct Inner {
    session: Mutex<Session>,
    options: BridgeOptions,
    fatal: FatalHandle,
}

/// Handle to the legacy session. Cheap to clone; all clones share the one
/// connection and its lock.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Wrap the write half of the control connection and the receiving end
    /// of the line queue.
    pub fn new<W>(
        writer: W,
        lines: mpsc::Receiver<String>,
        options: BridgeOptions,
        fatal: FatalHandle,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session {
                    writer: Box::new(writer),
                    lines,
                    owed_sentinels: 0,
                }),
                options,
                fatal,
            }),
        }
    }

    /// Ask the legacy store for `name` and classify its reply.
    pub async fn fetch_secret(&self, name: &str) -> Result<ResponseOutcome, BridgeError> {
        if name.is_empty() {
            return Err(BridgeError::EmptyName);
        }
        if name.contains(['\r', '\n']) {
            return Err(BridgeError::InvalidName);
        }
        if self.inner.fatal.is_tripped() {
            return Err(BridgeError::Unavailable);
        }

        let inner = Arc::clone(&self.inner);
        let name = name.to_owned();
        tokio::spawn(async move { inner.cycle(&name).await })
            .await
            .map_err(|e| BridgeError::Task(e.to_string()))?
    }
}

impl Inner {
    async fn cycle(&self, name: &str) -> Result<ResponseOutcome, BridgeError> {
        let mut session = self.session.lock().await;
        if self.fatal.is_tripped() {
            return Err(BridgeError::Unavailable);
        }

        let deadline = self.options.drain_timeout.map(|t| Instant::now() + t);

        self.resync(&mut session, deadline).await?;
        self.send_query(&mut session, name).await?;
        session.owed_sentinels += 1;

        let lines = self.drain(&mut session, deadline).await?;
        Ok(ResponseOutcome::classify(lines))
    }

    async fn send_query(&self, session: &mut Session, name: &str) -> Result<(), BridgeError> {
        let query = format!("{}\n", name);
        let writer = &mut session.writer;
        let write = async {
            writer.write_all(query.as_bytes()).await?;
            writer.flush().await
        };

        match tokio::time::timeout(self.options.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::Fatal(self.fatal.trip(FatalError::ControlWrite(e)))),
            Err(_) => Err(BridgeError::Fatal(
                self.fatal.trip(FatalError::WriteTimeout(self.options.write_timeout)),
            )),
        }
    }

    /// Collect the reply to the query just written.
    async fn drain(
        &self,
        session: &mut Session,
        deadline: Option<Instant>,
    ) -> Result<Vec<String>, BridgeError> {
        let mut lines = Vec::new();
        loop {
            let line = self.next_line(session, deadline).await?;
            if line == SENTINEL {
                session.owed_sentinels -= 1;
                return Ok(lines);
            }
            if line.is_empty() {
                continue;
            }
            lines.push(line);
        }
    }

    /// Throw away the remainder of replies to timed-out queries.
    async fn resync(&self, session: &mut Session, deadline: Option<Instant>) -> Result<(), BridgeError> {
        while session.owed_sentinels > 0 {
            let line = self.next_line(session, deadline).await?;
            if line == SENTINEL {
                session.owed_sentinels -= 1;
                tracing::warn!(owed = session.owed_sentinels, "Skipped reply to abandoned query");
            } else if !line.is_empty() {
                tracing::warn!("Discarded stale line from abandoned query");
            }
        }
        Ok(())
    }

    async fn next_line(
        &self,
        session: &mut Session,
        deadline: Option<Instant>,
    ) -> Result<String, BridgeError> {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, session.lines.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    let budget = self.options.drain_timeout.unwrap_or_default();
                    tracing::warn!(timeout = ?budget, "Legacy store reply timed out");
                    return Err(BridgeError::DrainTimeout(budget));
                }
            },
            None => session.lines.recv().await,
        };
        // The reader only hangs up after reporting the connection as dead.
        next.ok_or(BridgeError::Unavailable)
    }
}
