//! Control channel subsystem: the one connection to the legacy store.
//!
//! # Data Flow
//! ```text
//! Legacy store dials in
//!     → acceptor.rs (bind, readiness, single accept)
//!     → read half → reader.rs (lines → bounded queue)
//!     → write half + queue receiver → crate::bridge
//! ```

pub mod acceptor;
pub mod reader;

pub use acceptor::{ControlAcceptor, ReadySignal};
pub use reader::{forward_lines, line_queue};
