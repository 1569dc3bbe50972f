//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → tls.rs (self-signed identity, fingerprint)
//!     → crate::http::server (HTTPS via axum-server, or plain HTTP)
//! ```
//!
//! # Design Decisions
//! - The certificate is generated per run; clients pin the published
//!   public-key fingerprint instead of trusting a CA
//! - TLS can be disabled for tests or when terminated elsewhere

pub mod tls;

pub use tls::SelfSignedIdentity;
