//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Client-facing listener (bind address, TLS, fingerprint).
    pub listener: ListenerConfig,

    /// Control channel to the legacy store.
    pub control: ControlConfig,

    /// Client authentication.
    pub auth: AuthConfig,

    /// Response shaping.
    pub responses: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client-facing listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5555").
    pub bind_address: String,

    /// Serve HTTPS with a self-signed certificate.
    pub tls: bool,

    /// File the TLS fingerprint is written to.
    pub fingerprint_file: String,

    /// Subject alternative names for the self-signed certificate.
    pub tls_names: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5555".to_string(),
            tls: true,
            fingerprint_file: "tls_fingerprint".to_string(),
            tls_names: vec!["localhost".to_string()],
        }
    }
}

/// How readiness is announced once the control listener is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadySignalKind {
    /// Close stdout, so a parent reading it sees EOF.
    CloseStdout,
    /// Announce nothing.
    None,
}

/// Control channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Address the legacy store connects to.
    pub bind_address: String,

    /// How long to wait for the legacy store to connect, in seconds.
    pub accept_wait_secs: u64,

    /// Deadline for writing one query, in milliseconds.
    pub write_timeout_ms: u64,

    /// Capacity of the line queue between reader and bridge.
    pub queue_capacity: usize,

    /// Optional bound on draining one reply, in milliseconds.
    /// `None` waits for the sentinel forever.
    pub drain_timeout_ms: Option<u64>,

    /// Longest line accepted from the legacy store, excluding the newline.
    pub max_line_bytes: usize,

    /// Readiness announcement.
    pub ready_signal: ReadySignalKind,
}

impl ControlConfig {
    pub fn accept_wait(&self) -> Duration {
        Duration::from_secs(self.accept_wait_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9999".to_string(),
            accept_wait_secs: 10,
            write_timeout_ms: 1000,
            queue_capacity: 1024,
            drain_timeout_ms: None,
            max_line_bytes: 64 * 1024,
            ready_signal: ReadySignalKind::CloseStdout,
        }
    }
}

/// Client authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// One-shot file holding the client password. Deleted after reading.
    pub password_file: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_file: "passwordstore_password".to_string(),
        }
    }
}

/// Response shaping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Return every candidate line on an ambiguous (400) reply.
    pub expose_ambiguous: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            expose_ambiguous: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
