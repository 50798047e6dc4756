//! Wire protocol definitions for task results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// The outcome of one task: the success payload or the failure that replaced
/// it. The two are mutually exclusive by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task returned normally
    Completed { value: JsonValue },

    /// The task produced no usable value
    Failed { failure: TaskFailure },
}

/// Classified failure information carried inside a [`ResultEnvelope`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    /// Channel or process creation failed; no child ever ran
    Spawn { message: String },

    /// The child's channel carried no decodable result
    Transport { message: String },

    /// The task exceeded its wall-clock limit and was terminated
    Timeout { limit_ms: u64 },

    /// The invoked work itself faulted inside the child
    Task {
        message: String,
        details: Option<JsonValue>,
    },

    /// Unexpected fault while waiting on or collecting this task
    Internal { message: String },
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Spawn { message } => {
                write!(f, "Spawn failed: {}", message)
            }
            TaskFailure::Transport { message } => {
                write!(f, "Transport failed: {}", message)
            }
            TaskFailure::Timeout { limit_ms } => {
                write!(f, "Task timed out and was terminated after {}ms", limit_ms)
            }
            TaskFailure::Task { message, .. } => {
                write!(f, "Task failed: {}", message)
            }
            TaskFailure::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for TaskFailure {}

/// Resource usage captured from the wait on the child process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Peak resident set size as reported by the kernel (kilobytes on
    /// Linux); `None` when the wait call provided no usage data.
    pub max_rss_kb: Option<i64>,
}

/// The result of one task, produced inside the child process and transported
/// back to the parent over the result channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Correlation token of the originating task descriptor
    pub task_id: Uuid,
    /// Success payload or failure information
    pub outcome: TaskOutcome,
    /// Text the task wrote to its process's standard output
    pub output: String,
    /// Resource usage, merged in by the parent after reaping the child
    pub usage: ResourceUsage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ResultEnvelope {
    /// Create an envelope for a task that returned normally
    pub fn completed(
        task_id: Uuid,
        value: JsonValue,
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let duration_ms = (completed_at - started_at).num_milliseconds();
        Self {
            task_id,
            outcome: TaskOutcome::Completed { value },
            output,
            usage: ResourceUsage::default(),
            started_at,
            completed_at,
            duration_ms,
        }
    }

    /// Create an envelope for a task that faulted
    pub fn failed(
        task_id: Uuid,
        failure: TaskFailure,
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let duration_ms = (completed_at - started_at).num_milliseconds();
        Self {
            task_id,
            outcome: TaskOutcome::Failed { failure },
            output,
            usage: ResourceUsage::default(),
            started_at,
            completed_at,
            duration_ms,
        }
    }

    /// Create a failure envelope synthesized on the parent side, for tasks
    /// whose child never produced one (spawn, transport, timeout paths).
    pub fn failed_now(task_id: Uuid, failure: TaskFailure) -> Self {
        let now = Utc::now();
        Self::failed(task_id, failure, String::new(), now, now)
    }

    /// Whether this envelope carries a success payload
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Completed { .. })
    }

    /// The success payload, if any
    pub fn value(&self) -> Option<&JsonValue> {
        match &self.outcome {
            TaskOutcome::Completed { value } => Some(value),
            TaskOutcome::Failed { .. } => None,
        }
    }

    /// The failure information, if any
    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.outcome {
            TaskOutcome::Completed { .. } => None,
            TaskOutcome::Failed { failure } => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_envelope() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(1500);
        let id = Uuid::new_v4();

        let envelope =
            ResultEnvelope::completed(id, json!({"sum": 8}), "working\n".to_string(), start, end);

        assert!(envelope.is_completed());
        assert_eq!(envelope.duration_ms, 1500);
        assert_eq!(envelope.value(), Some(&json!({"sum": 8})));
        assert!(envelope.failure().is_none());
        assert_eq!(envelope.output, "working\n");
    }

    #[test]
    fn test_failed_envelope() {
        let id = Uuid::new_v4();
        let envelope = ResultEnvelope::failed_now(
            id,
            TaskFailure::Task {
                message: "division by zero".to_string(),
                details: None,
            },
        );

        assert!(!envelope.is_completed());
        assert!(envelope.value().is_none());
        assert!(matches!(
            envelope.failure(),
            Some(TaskFailure::Task { message, .. }) if message == "division by zero"
        ));
    }

    #[test]
    fn test_envelope_round_trip() {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(42);
        let id = Uuid::new_v4();

        let envelope =
            ResultEnvelope::completed(id, json!([1, 2, 3]), "printed text".to_string(), start, end);

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: ResultEnvelope = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.task_id, id);
        assert_eq!(decoded.value(), Some(&json!([1, 2, 3])));
        assert_eq!(decoded.output, "printed text");
        assert_eq!(decoded.duration_ms, 42);
    }

    #[test]
    fn test_failure_round_trip() {
        let id = Uuid::new_v4();
        let envelope = ResultEnvelope::failed_now(id, TaskFailure::Timeout { limit_ms: 2000 });

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"kind\":\"timeout\""));

        let decoded: ResultEnvelope = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            decoded.failure(),
            Some(TaskFailure::Timeout { limit_ms: 2000 })
        ));
    }

    #[test]
    fn test_failure_display() {
        let failure = TaskFailure::Timeout { limit_ms: 3000 };
        assert_eq!(
            failure.to_string(),
            "Task timed out and was terminated after 3000ms"
        );

        let failure = TaskFailure::Transport {
            message: "no data".to_string(),
        };
        assert_eq!(failure.to_string(), "Transport failed: no data");
    }

    #[test]
    fn test_usage_merge_target() {
        let id = Uuid::new_v4();
        let mut envelope = ResultEnvelope::failed_now(id, TaskFailure::Timeout { limit_ms: 100 });
        assert!(envelope.usage.max_rss_kb.is_none());

        envelope.usage = ResourceUsage {
            max_rss_kb: Some(2048),
        };
        let decoded: ResultEnvelope =
            serde_json::from_str(&serde_json::to_string(&envelope).unwrap()).unwrap();
        assert_eq!(decoded.usage.max_rss_kb, Some(2048));
    }
}
