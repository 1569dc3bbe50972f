//! legacy-bridge
//!
//! Wraps an old line-oriented password store in authenticated HTTPS.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  LEGACY BRIDGE                   │
//!                      │                                                  │
//!   HTTPS GET /{name}  │  ┌────────┐   ┌────────┐   ┌─────────────────┐   │
//!   ───────────────────┼─▶│  tls   │──▶│  http  │──▶│     bridge      │   │
//!                      │  │ (net)  │   │ + auth │   │ lock/write/drain│   │
//!                      │  └────────┘   └────────┘   └───┬─────────▲───┘   │
//!                      │                                │ "name\n" │ lines │
//!                      │                                ▼         │       │
//!                      │                        ┌───────────┐ ┌───┴─────┐ │
//!                      │                        │ control   │ │ reader  │ │
//!                      │                        │ write half│ │ → queue │ │
//!                      │                        └─────┬─────┘ └───▲─────┘ │
//!                      └──────────────────────────────┼───────────┼───────┘
//!                                                     ▼           │
//!                                               ┌─────────────────────┐
//!                                               │    legacy store     │
//!                                               └─────────────────────┘
//! ```
//!
//! The store connects to us, once. Losing that connection ends the process.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use legacy_bridge::bridge::{Bridge, BridgeOptions};
use legacy_bridge::config::loader::{read_config, ConfigError};
use legacy_bridge::config::validation::validate_config;
use legacy_bridge::config::BridgeConfig;
use legacy_bridge::control::{forward_lines, line_queue, ControlAcceptor};
use legacy_bridge::http::{ClientPassword, HttpServer};
use legacy_bridge::lifecycle::{fatal, startup, FatalError, Shutdown};
use legacy_bridge::net::SelfSignedIdentity;
use legacy_bridge::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "legacy-bridge", version)]
#[command(
    about = "Serve a legacy line-oriented password store over authenticated HTTPS",
    long_about = "Listens for the legacy password store, which must connect within \
--control-wait. Stdout is closed once the control listener is ready.\n\n\
Serves HTTPS requests, which must carry basic auth with the password from \
--password-file and the secret name as the path. The TLS fingerprint is \
written to --fingerprint."
)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTPS listen address
    #[arg(long, value_name = "ADDRESS")]
    https_listen: Option<String>,

    /// Legacy store listen address
    #[arg(long, value_name = "ADDRESS")]
    control_listen: Option<String>,

    /// Seconds to wait for the legacy store to connect
    #[arg(long, value_name = "SECS")]
    control_wait: Option<u64>,

    /// TLS fingerprint file
    #[arg(long, value_name = "FILE")]
    fingerprint: Option<String>,

    /// One-shot file holding the required client password
    #[arg(long, value_name = "FILE")]
    password_file: Option<String>,

    /// Serve plain HTTP
    #[arg(long)]
    no_tls: bool,
}

impl Cli {
    /// Load the config file (if any), apply overrides, validate.
    fn into_config(self) -> Result<BridgeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(addr) = self.https_listen {
            config.listener.bind_address = addr;
        }
        if let Some(addr) = self.control_listen {
            config.control.bind_address = addr;
        }
        if let Some(secs) = self.control_wait {
            config.control.accept_wait_secs = secs;
        }
        if let Some(path) = self.fingerprint {
            config.listener.fingerprint_file = path;
        }
        if let Some(path) = self.password_file {
            config.auth.password_file = path;
        }
        if self.no_tls {
            config.listener.tls = false;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    logging::init(&config.observability.log_level);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, exit_code = e.exit_code(), "Exiting");
        std::process::exit(e.exit_code());
    }
    tracing::info!("Shutdown complete");
}

async fn run(config: BridgeConfig) -> Result<(), Arc<FatalError>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting");

    let password = startup::take_credential(Path::new(&config.auth.password_file))?;

    if config.observability.metrics_enabled {
        // Validation has already checked that the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr)?;
        }
    }

    // Legacy store.
    let (fatal, supervisor) = fatal::channel();
    let acceptor = ControlAcceptor::bind(&config.control.bind_address).await?;
    let (stream, _peer) = acceptor
        .accept_one(config.control.ready_signal.into(), config.control.accept_wait())
        .await?;
    let (read_half, write_half) = stream.into_split();
    let (queue_tx, queue_rx) = line_queue(config.control.queue_capacity);
    tokio::spawn(forward_lines(
        read_half,
        queue_tx,
        config.control.max_line_bytes,
        fatal.clone(),
    ));

    if config.control.drain_timeout().is_none() {
        tracing::info!("No drain timeout: an unanswered query blocks every later request");
    }
    let bridge = Bridge::new(
        write_half,
        queue_rx,
        BridgeOptions::from(&config.control),
        fatal.clone(),
    );

    // Clients.
    let server = HttpServer::new(bridge, ClientPassword::new(password), config.responses.clone());
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| FatalError::Bind {
            addr: config.listener.bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let serving = if config.listener.tls {
        let identity = SelfSignedIdentity::generate(&config.listener.tls_names)?;
        let tls = identity.rustls_config().await?;
        startup::publish_fingerprint(
            Path::new(&config.listener.fingerprint_file),
            identity.fingerprint(),
        )?;
        let listener = listener.into_std().map_err(FatalError::Serve)?;
        tokio::spawn(server.run_tls(listener, tls, shutdown.subscribe()))
    } else {
        tokio::spawn(server.run(listener, shutdown.subscribe()))
    };

    tokio::select! {
        failure = supervisor.wait() => match failure {
            Some(error) => Err(error),
            None => Ok(()),
        },
        served = serving => match served {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FatalError::Serve(e).into()),
            Err(e) => Err(FatalError::Serve(std::io::Error::other(e)).into()),
        },
    }
}
