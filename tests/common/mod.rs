//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use legacy_bridge::bridge::{Bridge, BridgeOptions};
use legacy_bridge::config::ResponseConfig;
use legacy_bridge::control::{forward_lines, line_queue, ControlAcceptor, ReadySignal};
use legacy_bridge::http::{ClientPassword, HttpServer};
use legacy_bridge::lifecycle::{fatal, Shutdown, Supervisor};

pub const PASSWORD: &str = "correct horse";

/// What the fake store saw and did, in order.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Query(String, Instant),
    /// Recorded just before the sentinel is written.
    Done(Instant),
}

/// A scripted stand-in for the legacy store.
#[derive(Clone, Default)]
pub struct FakeStore {
    answers: HashMap<String, Vec<String>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    close_after: Option<usize>,
    pub log: Arc<Mutex<Vec<StoreEvent>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `name` with `lines` (then the sentinel).
    pub fn with_answer(mut self, name: &str, lines: &[&str]) -> Self {
        self.answers
            .insert(name.to_string(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Pause before answering any query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Pause before answering `name` only.
    pub fn with_delay_for(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Hang up after answering `n` queries.
    pub fn close_after(mut self, n: usize) -> Self {
        self.close_after = Some(n);
        self
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.log.lock().unwrap().clone()
    }

    /// Dial the bridge and answer queries until told to stop.
    pub async fn run(self, control: SocketAddr) {
        let stream = TcpStream::connect(control).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut queries = BufReader::new(reader).lines();
        let mut served = 0;

        while let Ok(Some(query)) = queries.next_line().await {
            self.log
                .lock()
                .unwrap()
                .push(StoreEvent::Query(query.clone(), Instant::now()));
            let delay = self.delays.get(&query).copied().unwrap_or(self.default_delay);
            tokio::time::sleep(delay).await;

            let mut reply = String::new();
            for line in self.answers.get(&query).into_iter().flatten() {
                reply.push_str(line);
                reply.push('\n');
            }
            writer.write_all(reply.as_bytes()).await.unwrap();
            self.log.lock().unwrap().push(StoreEvent::Done(Instant::now()));
            writer.write_all(b"done\n").await.unwrap();

            served += 1;
            if self.close_after == Some(served) {
                break;
            }
        }
    }
}

/// A bridge wired up the way main wires it, serving plain HTTP.
pub struct RunningBridge {
    pub http_addr: SocketAddr,
    pub supervisor: Option<Supervisor>,
    pub shutdown: Shutdown,
    pub store_task: JoinHandle<()>,
}

impl RunningBridge {
    pub fn url(&self, name: &str) -> String {
        format!("http://{}/{}", self.http_addr, name)
    }
}

pub async fn start_bridge(store: FakeStore, options: BridgeOptions) -> RunningBridge {
    let acceptor = ControlAcceptor::bind("127.0.0.1:0").await.unwrap();
    let control_addr = acceptor.local_addr().unwrap();
    let store_task = tokio::spawn(store.run(control_addr));

    let (stream, _) = acceptor
        .accept_one(ReadySignal::Silent, Duration::from_secs(5))
        .await
        .unwrap();

    let (fatal, supervisor) = fatal::channel();
    let (read_half, write_half) = stream.into_split();
    let (queue_tx, queue_rx) = line_queue(64);
    tokio::spawn(forward_lines(read_half, queue_tx, 64 * 1024, fatal.clone()));
    let bridge = Bridge::new(write_half, queue_rx, options, fatal);

    let server = HttpServer::new(bridge, ClientPassword::new(PASSWORD), ResponseConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningBridge {
        http_addr,
        supervisor: Some(supervisor),
        shutdown,
        store_task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
