//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Read password file → Accept legacy store → Publish fingerprint
//!
//! Fatal (fatal.rs):
//!     Component trips FatalHandle → Supervisor wakes main → exit(code)
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Stop accepting → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the legacy store connects before any client is served
//! - One exit point: only main terminates the process

pub mod fatal;
pub mod shutdown;
pub mod startup;

pub use fatal::{FatalError, FatalHandle, Supervisor};
pub use shutdown::Shutdown;
