//! Process-per-task runner: fork, collect, merge
//!
//! The runner forks one child per descriptor up front so every task runs in
//! parallel, then waits on the children sequentially in submission order.
//! Collection order therefore follows submission order, not completion
//! order; correctness is unaffected because every envelope is correlated by
//! token. One process and one socket pair stay live per task for the whole
//! batch, so resource consumption grows linearly with batch size.

use forkpool_ipc::{ChildEndpoint, IpcError, ParentEndpoint, ResultChannel, ResultEnvelope, TaskFailure};
use nix::unistd::{fork, ForkResult, Pid};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::factory::TaskFactory;
use crate::runner::{execute_in_place, TaskRunner};
use crate::task::TaskDescriptor;
use crate::wait::{self, WaitOutcome};

/// Configuration for the fork runner
#[derive(Debug, Clone)]
pub struct ForkRunnerConfig {
    /// Non-blocking poll interval while a task with a timeout is running
    pub poll_interval: Duration,
    /// Grace period between the graceful and the forceful kill signal
    pub grace_period: Duration,
    /// Upper bound of the randomized delay preceding the post-fork reseed
    pub reseed_jitter_max: Duration,
}

impl Default for ForkRunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            grace_period: Duration::from_millis(200),
            reseed_jitter_max: Duration::from_millis(5),
        }
    }
}

/// Process-based task runner.
///
/// `run` forks one child per task (phase 1), then per task in submission
/// order waits with the timeout policy, reads the result channel to
/// end-of-stream, and merges resource usage (phase 2), and finally attaches
/// every envelope to its descriptor (phase 3). Each task ends up with
/// exactly one correlated envelope; per-task faults of any kind become
/// failure envelopes and never abort the rest of the batch.
pub struct ForkRunner<F: TaskFactory> {
    factory: F,
    config: ForkRunnerConfig,
    // Swappable channel source so tests can inject channel-creation failures
    channel_fn: fn() -> Result<(ParentEndpoint, ChildEndpoint), IpcError>,
}

impl<F: TaskFactory> ForkRunner<F> {
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, ForkRunnerConfig::default())
    }

    pub fn with_config(factory: F, config: ForkRunnerConfig) -> Self {
        Self {
            factory,
            config,
            channel_fn: ResultChannel::pair,
        }
    }

    /// Phase 1: fork all children before waiting on any, in submission
    /// order. A task whose channel or fork fails gets a spawn-failure
    /// envelope immediately and no process.
    fn spawn_all(
        &self,
        tasks: &[TaskDescriptor],
        pids: &mut HashMap<Uuid, Pid>,
        endpoints: &mut HashMap<Uuid, ParentEndpoint>,
        envelopes: &mut HashMap<Uuid, ResultEnvelope>,
    ) {
        for task in tasks {
            match self.spawn_one(task) {
                Ok((pid, endpoint)) => {
                    debug!(task_id = %task.id(), pid = pid.as_raw(), "forked child");
                    pids.insert(task.id(), pid);
                    endpoints.insert(task.id(), endpoint);
                }
                Err(e) => {
                    warn!(task_id = %task.id(), error = %e, "spawn failed");
                    envelopes.insert(
                        task.id(),
                        ResultEnvelope::failed_now(
                            task.id(),
                            TaskFailure::Spawn {
                                message: e.to_string(),
                            },
                        ),
                    );
                }
            }
        }
    }

    fn spawn_one(&self, task: &TaskDescriptor) -> Result<(Pid, ParentEndpoint), ExecutionError> {
        let (parent_endpoint, child_endpoint) = (self.channel_fn)()?;

        // SAFETY: the child branch runs exactly one task and exits without
        // returning into the orchestrator.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                drop(child_endpoint);
                Ok((child, parent_endpoint))
            }
            Ok(ForkResult::Child) => {
                drop(parent_endpoint);
                self.run_child(task, child_endpoint)
            }
            Err(e) => Err(ExecutionError::Spawn(e.to_string())),
        }
    }

    /// Child-side procedure: reseed, execute with stdout capture, ship the
    /// envelope, exit. The exit status is always 0; failure travels only
    /// inside the envelope.
    fn run_child(&self, task: &TaskDescriptor, endpoint: ChildEndpoint) -> ! {
        reseed_after_fork(self.config.reseed_jitter_max);

        let envelope = execute_in_place(&self.factory, task);
        let _ = endpoint.send(&envelope);

        std::process::exit(0);
    }

    /// Phase 2, one task: wait (with or without deadline), read the channel
    /// to end-of-stream, merge resource usage. The parent endpoint is closed
    /// on every path, and every fault resolves to a failure envelope.
    fn collect_one(
        &self,
        task: &TaskDescriptor,
        pid: Pid,
        endpoint: Option<ParentEndpoint>,
        batch_start: Instant,
    ) -> ResultEnvelope {
        match self.try_collect(task, pid, endpoint, batch_start) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(task_id = %task.id(), error = %e, "collection fault");
                ResultEnvelope::failed_now(task.id(), failure_for(e))
            }
        }
    }

    fn try_collect(
        &self,
        task: &TaskDescriptor,
        pid: Pid,
        endpoint: Option<ParentEndpoint>,
        batch_start: Instant,
    ) -> Result<ResultEnvelope, ExecutionError> {
        let outcome = match task.timeout() {
            Some(limit) => wait::wait_with_deadline(
                pid,
                batch_start,
                limit,
                self.config.poll_interval,
                self.config.grace_period,
            )?,
            None => WaitOutcome::Exited {
                usage: wait::wait_blocking(pid)?,
            },
        };

        let usage = match outcome {
            WaitOutcome::TimedOut { usage } => {
                let limit_ms = task.timeout().unwrap_or_default().as_millis() as u64;
                let mut envelope =
                    ResultEnvelope::failed_now(task.id(), TaskFailure::Timeout { limit_ms });
                envelope.usage = usage;
                return Ok(envelope);
            }
            WaitOutcome::Exited { usage } => usage,
        };

        let endpoint = endpoint.ok_or_else(|| {
            ExecutionError::Internal("result channel missing for spawned task".to_string())
        })?;
        let mut envelope = endpoint.receive()?;

        if envelope.task_id != task.id() {
            return Err(ExecutionError::Internal(format!(
                "correlation mismatch: envelope {} received for task {}",
                envelope.task_id,
                task.id()
            )));
        }

        if envelope.usage.max_rss_kb.is_none() {
            envelope.usage = usage;
        }

        Ok(envelope)
    }
}

impl<F: TaskFactory> TaskRunner for ForkRunner<F> {
    fn run(&self, tasks: &mut [TaskDescriptor]) -> HashMap<Uuid, ResultEnvelope> {
        let batch_start = Instant::now();
        debug!(task_count = tasks.len(), "starting process-per-task batch");

        // Two batch-local maps keyed by correlation token; neither outlives
        // this call.
        let mut pids: HashMap<Uuid, Pid> = HashMap::new();
        let mut endpoints: HashMap<Uuid, ParentEndpoint> = HashMap::new();
        let mut envelopes: HashMap<Uuid, ResultEnvelope> = HashMap::with_capacity(tasks.len());

        self.spawn_all(tasks, &mut pids, &mut endpoints, &mut envelopes);

        for task in tasks.iter() {
            let Some(pid) = pids.get(&task.id()).copied() else {
                continue;
            };
            let endpoint = endpoints.remove(&task.id());
            let envelope = self.collect_one(task, pid, endpoint, batch_start);
            envelopes.insert(task.id(), envelope);
        }

        // Phase 3: attach each envelope onto its originating descriptor
        for task in tasks.iter_mut() {
            if let Some(envelope) = envelopes.get(&task.id()) {
                task.attach_result(envelope.clone());
            }
        }

        envelopes
    }
}

fn failure_for(err: ExecutionError) -> TaskFailure {
    match err {
        ExecutionError::Ipc(e) => TaskFailure::Transport {
            message: e.to_string(),
        },
        other => TaskFailure::Internal {
            message: other.to_string(),
        },
    }
}

/// Post-fork fixup: process duplication leaves the child's PRNG state
/// identical to its siblings'. Sleep a small per-child jitter, then reseed
/// the process-local generator from the clock and the child's own pid.
fn reseed_after_fork(jitter_max: Duration) {
    let pid = std::process::id() as u64;
    let nanos = || {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0)
    };

    let max_micros = jitter_max.as_micros() as u64;
    if max_micros > 0 {
        let delay = nanos().wrapping_mul(31).wrapping_add(pid) % max_micros;
        thread::sleep(Duration::from_micros(delay));
    }

    fastrand::seed(nanos().rotate_left(32) ^ pid);
}
