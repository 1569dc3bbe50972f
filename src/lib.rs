//! Authenticated HTTPS front end for a line-oriented legacy password store.

pub mod bridge;
pub mod config;
pub mod control;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use bridge::{Bridge, BridgeError, BridgeOptions, OutcomeKind, ResponseOutcome};
pub use config::BridgeConfig;
pub use http::HttpServer;
pub use lifecycle::{FatalError, Shutdown};
