//! Forkpool result transport
//!
//! This crate defines the wire protocol between a forked child process and
//! its parent, and the one-shot socket-pair channel that carries it. Each
//! channel transports exactly one serialized [`ResultEnvelope`] from child to
//! parent; closing the child's endpoint is the message framing boundary.

pub mod channel;
pub mod error;
pub mod protocol;

// Re-export main types
pub use channel::{ChildEndpoint, ParentEndpoint, ResultChannel};
pub use error::IpcError;
pub use protocol::{ResourceUsage, ResultEnvelope, TaskFailure, TaskOutcome};
