//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS (or plain) connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → auth.rs (Basic auth; 401 stops here)
//!     → server.rs handler → crate::bridge
//!     → outcome mapped to 200 / 400 / 500 (504 / 503 on failure)
//!     → Send to client
//! ```

pub mod auth;
pub mod request;
pub mod server;

pub use auth::ClientPassword;
pub use request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
