//! Task descriptors submitted to a runner

use forkpool_ipc::ResultEnvelope;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

/// Specification of one unit of work plus the slot for its eventual result.
///
/// The descriptor is read-only while the batch runs; the runner writes the
/// result slot exactly once after the task completes or fails, and never
/// retains a reference after the batch returns.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    id: Uuid,
    task_type: String,
    method: String,
    args: Vec<JsonValue>,
    timeout: Option<Duration>,
    result: Option<ResultEnvelope>,
}

impl TaskDescriptor {
    /// Create a descriptor for one invocation of `method` on a `task_type`
    /// instance. A fresh correlation token is generated here and stays
    /// stable for the descriptor's lifetime.
    pub fn new(
        task_type: impl Into<String>,
        method: impl Into<String>,
        args: Vec<JsonValue>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            method: method.into(),
            args,
            timeout: None,
            result: None,
        }
    }

    /// Set the wall-clock limit for this task, measured from batch start.
    /// Without one the runner waits indefinitely.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Correlation token linking this descriptor to its result envelope
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[JsonValue] {
        &self.args
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The attached result, once the batch has run
    pub fn result(&self) -> Option<&ResultEnvelope> {
        self.result.as_ref()
    }

    /// Take ownership of the attached result
    pub fn take_result(&mut self) -> Option<ResultEnvelope> {
        self.result.take()
    }

    /// Attach the result envelope. Called once per descriptor by the runner
    /// after the task completed or failed.
    pub fn attach_result(&mut self, envelope: ResultEnvelope) {
        self.result = Some(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkpool_ipc::TaskFailure;
    use serde_json::json;

    #[test]
    fn test_descriptor_construction() {
        let task = TaskDescriptor::new("math", "add", vec![json!(2), json!(3)]);

        assert_eq!(task.task_type(), "math");
        assert_eq!(task.method(), "add");
        assert_eq!(task.args(), &[json!(2), json!(3)]);
        assert!(task.timeout().is_none());
        assert!(task.result().is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = TaskDescriptor::new("math", "add", vec![]);
        let b = TaskDescriptor::new("math", "add", vec![]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_with_timeout() {
        let task =
            TaskDescriptor::new("math", "add", vec![]).with_timeout(Duration::from_secs(2));
        assert_eq!(task.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_result_slot() {
        let mut task = TaskDescriptor::new("math", "add", vec![]);
        let envelope =
            ResultEnvelope::failed_now(task.id(), TaskFailure::Timeout { limit_ms: 100 });

        task.attach_result(envelope);
        assert!(task.result().is_some());

        let taken = task.take_result().unwrap();
        assert_eq!(taken.task_id, task.id());
        assert!(task.result().is_none());
    }
}
