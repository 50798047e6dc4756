//! Forkpool Execution Engine
//!
//! Process-level parallel task execution for a single-threaded host: one OS
//! process is forked per submitted task, the child runs the work and ships
//! its result back over a one-shot channel, and the parent enforces optional
//! per-task wall-clock timeouts with graceful-then-forceful termination.
//!
//! The engine is unix-only and deliberately synchronous: all children are
//! forked up front, so the sequential collection phase is bounded by the
//! slowest task rather than the sum.

pub mod error;
pub mod factory;
pub mod output;
pub mod process;
pub mod runner;
pub mod task;

mod wait;

// Re-export main types
pub use error::ExecutionError;
pub use factory::{FactoryError, Task, TaskError, TaskFactory, TaskRegistry};
pub use output::StdoutCapture;
pub use process::{ForkRunner, ForkRunnerConfig};
pub use runner::{SequentialRunner, TaskRunner};
pub use task::TaskDescriptor;

// Re-export the wire types callers see on every envelope
pub use forkpool_ipc::{ResourceUsage, ResultEnvelope, TaskFailure, TaskOutcome};
