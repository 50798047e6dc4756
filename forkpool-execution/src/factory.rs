//! Task resolution: the factory capability and a registry-backed default
//!
//! The engine consumes a [`TaskFactory`] to turn a descriptor's task-type
//! identifier into an invokable instance. Host frameworks typically plug in
//! their own dependency-injection container here; [`TaskRegistry`] is the
//! standalone implementation used by tests and embedders without one.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a task implementation
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors raised while resolving a task type into an instance
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Task construction failed: {0}")]
    Construction(String),
}

/// An invokable unit of work
pub trait Task {
    /// Invoke `method` with the descriptor's ordered arguments
    fn invoke(&self, method: &str, args: &[JsonValue]) -> Result<JsonValue, TaskError>;
}

/// Resolves a task-type identifier into an invokable instance.
///
/// Resolution may fail; the runner converts that into a failure envelope for
/// the task rather than propagating it to the caller.
pub trait TaskFactory {
    fn create(&self, task_type: &str) -> Result<Box<dyn Task>, FactoryError>;
}

type Constructor = Box<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// A [`TaskFactory`] backed by registered constructor closures
#[derive(Default)]
pub struct TaskRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a task type, replacing any previous one
    pub fn register<T, F>(&mut self, task_type: impl Into<String>, constructor: F)
    where
        T: Task + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors.insert(
            task_type.into(),
            Box::new(move || Box::new(constructor()) as Box<dyn Task>),
        );
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.constructors.contains_key(task_type)
    }
}

impl TaskFactory for TaskRegistry {
    fn create(&self, task_type: &str) -> Result<Box<dyn Task>, FactoryError> {
        let constructor = self
            .constructors
            .get(task_type)
            .ok_or_else(|| FactoryError::UnknownTaskType(task_type.to_string()))?;
        Ok(constructor())
    }
}
