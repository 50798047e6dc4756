//! Runner contract and the in-process sequential variant

use chrono::Utc;
use forkpool_ipc::{ResultEnvelope, TaskFailure};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;
use uuid::Uuid;

use crate::factory::TaskFactory;
use crate::output::StdoutCapture;
use crate::task::TaskDescriptor;

/// Runner strategies share one contract: execute a batch of descriptors,
/// return the token-to-envelope map, and attach each envelope onto its
/// originating descriptor. The batch call itself never fails; every per-task
/// fault is resolved into a failure envelope.
pub trait TaskRunner {
    fn run(&self, tasks: &mut [TaskDescriptor]) -> HashMap<Uuid, ResultEnvelope>;
}

/// Resolve and invoke one task in the current process, with stdout capture
/// and panic conversion. This is the child-side body of the fork runner and
/// the whole of the sequential runner.
pub(crate) fn execute_in_place<F: TaskFactory>(
    factory: &F,
    task: &TaskDescriptor,
) -> ResultEnvelope {
    let started_at = Utc::now();
    let capture = StdoutCapture::begin().ok();

    let invoked = panic::catch_unwind(AssertUnwindSafe(|| invoke(factory, task)));

    let output = capture
        .map(|c| c.finish().unwrap_or_default())
        .unwrap_or_default();
    let completed_at = Utc::now();

    match invoked {
        Ok(Ok(value)) => {
            ResultEnvelope::completed(task.id(), value, output, started_at, completed_at)
        }
        Ok(Err(failure)) => {
            ResultEnvelope::failed(task.id(), failure, output, started_at, completed_at)
        }
        Err(payload) => ResultEnvelope::failed(
            task.id(),
            TaskFailure::Task {
                message: panic_message(payload),
                details: None,
            },
            output,
            started_at,
            completed_at,
        ),
    }
}

fn invoke<F: TaskFactory>(factory: &F, task: &TaskDescriptor) -> Result<JsonValue, TaskFailure> {
    let instance = factory.create(task.task_type()).map_err(|e| TaskFailure::Task {
        message: e.to_string(),
        details: None,
    })?;

    instance
        .invoke(task.method(), task.args())
        .map_err(|e| TaskFailure::Task {
            message: e.to_string(),
            details: None,
        })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// In-process runner variant: no fork, no IPC, tasks run one after another
/// on the calling thread.
///
/// Useful where process creation is unavailable. Shares the [`TaskRunner`]
/// contract with the fork runner, with two deliberate gaps: per-task
/// timeouts are not enforced (nothing can preempt in-process work) and
/// resource usage is not captured.
pub struct SequentialRunner<F: TaskFactory> {
    factory: F,
}

impl<F: TaskFactory> SequentialRunner<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F: TaskFactory> TaskRunner for SequentialRunner<F> {
    fn run(&self, tasks: &mut [TaskDescriptor]) -> HashMap<Uuid, ResultEnvelope> {
        debug!(task_count = tasks.len(), "running batch sequentially");

        let mut envelopes = HashMap::with_capacity(tasks.len());
        for task in tasks.iter_mut() {
            let envelope = execute_in_place(&self.factory, task);
            envelopes.insert(task.id(), envelope.clone());
            task.attach_result(envelope);
        }
        envelopes
    }
}
