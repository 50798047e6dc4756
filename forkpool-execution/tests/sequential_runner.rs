//! In-process runner variant: same contract, no fork, no IPC
//!
//! Kept as a single test: the runner redirects this process's stdout while a
//! task runs, and a lone test keeps the harness quiet during that window.

use forkpool_execution::{
    SequentialRunner, Task, TaskDescriptor, TaskError, TaskFailure, TaskRegistry, TaskRunner,
};
use serde_json::{json, Value as JsonValue};
use std::io::Write;

struct LabTask;

impl Task for LabTask {
    fn invoke(&self, method: &str, args: &[JsonValue]) -> Result<JsonValue, TaskError> {
        match method {
            "add" => {
                let a = args.first().and_then(JsonValue::as_i64).unwrap_or(0);
                let b = args.get(1).and_then(JsonValue::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            }
            "fail" => Err(TaskError::Failed("deliberate failure".to_string())),
            "print" => {
                let text = args.first().and_then(JsonValue::as_str).unwrap_or("");
                let mut stdout = std::io::stdout();
                stdout.write_all(text.as_bytes()).unwrap();
                stdout.flush().unwrap();
                Ok(json!(text.len()))
            }
            other => Err(TaskError::UnknownMethod(other.to_string())),
        }
    }
}

#[test]
fn sequential_runner_shares_the_batch_contract() {
    let mut registry = TaskRegistry::new();
    registry.register("lab", || LabTask);
    let runner = SequentialRunner::new(registry);

    let mut tasks = vec![
        TaskDescriptor::new("lab", "add", vec![json!(20), json!(22)]),
        TaskDescriptor::new("lab", "fail", vec![]),
        TaskDescriptor::new("lab", "print", vec![json!("in-process output")]),
    ];

    let envelopes = runner.run(&mut tasks);
    assert_eq!(envelopes.len(), 3);

    // Success payload correlated by token and attached to the descriptor
    let add = &envelopes[&tasks[0].id()];
    assert_eq!(add.value(), Some(&json!(42)));
    assert_eq!(tasks[0].result().unwrap().value(), Some(&json!(42)));

    // A fault becomes a failure envelope without disturbing siblings
    assert!(matches!(
        envelopes[&tasks[1].id()].failure(),
        Some(TaskFailure::Task { message, .. }) if message == "deliberate failure"
    ));

    // Stdout capture works without a child process too
    let print = &envelopes[&tasks[2].id()];
    assert_eq!(print.output, "in-process output");

    // No child means no wait call and no resource usage
    assert!(print.usage.max_rss_kb.is_none());
}
