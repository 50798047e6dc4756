//! Error types for the execution engine
//!
//! These errors are internal to one task's spawn/collect path; the runner
//! converts every one of them into a failure envelope so a single task's
//! fault never aborts the batch.

use forkpool_ipc::IpcError;
use thiserror::Error;

/// Per-task engine errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Process creation failed; no child is running for this task
    #[error("Spawn failed: {0}")]
    Spawn(String),

    /// Waiting on the child process failed
    #[error("Wait failed: {0}")]
    Wait(String),

    /// Result transport failed
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// Invariant violation while collecting a result
    #[error("Internal error: {0}")]
    Internal(String),
}
