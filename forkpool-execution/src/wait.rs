//! Child-process waiting and the timeout termination state machine
//!
//! All waits go through `wait4` so peak resident memory is available from
//! every reap, including the kill paths. The state machine escalates
//! RUNNING -> TERMINATING_GRACEFUL -> TERMINATING_FORCEFUL -> REAPED; a
//! terminated child is always reaped, never left as a zombie.

use forkpool_ipc::ResourceUsage;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::ExecutionError;

/// How one wait concluded
#[derive(Debug)]
pub(crate) enum WaitOutcome {
    /// The child exited on its own
    Exited { usage: ResourceUsage },
    /// The child outlived its limit and was terminated
    TimedOut { usage: ResourceUsage },
}

/// Block until the child exits, capturing its resource usage
pub(crate) fn wait_blocking(pid: Pid) -> Result<ResourceUsage, ExecutionError> {
    loop {
        match wait4(pid, 0) {
            Ok((reaped, _, usage)) if reaped == pid.as_raw() => return Ok(usage),
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExecutionError::Wait(e.to_string())),
        }
    }
}

/// Wait on the child with a wall-clock limit measured from batch start.
///
/// While running, the child is polled non-blockingly every `poll_interval`.
/// Once the limit is exceeded the child receives SIGTERM, is granted
/// `grace_period` to exit, and is then killed outright. Every path reaps.
pub(crate) fn wait_with_deadline(
    pid: Pid,
    batch_start: Instant,
    limit: Duration,
    poll_interval: Duration,
    grace_period: Duration,
) -> Result<WaitOutcome, ExecutionError> {
    loop {
        if let Some(usage) = poll(pid)? {
            return Ok(WaitOutcome::Exited { usage });
        }

        if batch_start.elapsed() > limit {
            warn!(pid = pid.as_raw(), limit_ms = limit.as_millis() as u64, "task deadline exceeded, terminating child");
            return terminate(pid, grace_period);
        }

        thread::sleep(poll_interval);
    }
}

/// Graceful-then-forceful termination, ending in a reap
fn terminate(pid: Pid, grace_period: Duration) -> Result<WaitOutcome, ExecutionError> {
    // A failed SIGTERM can only mean the child is already a zombie awaiting
    // reap; the follow-up poll collects it either way.
    let _ = kill(pid, Signal::SIGTERM);
    thread::sleep(grace_period);

    if let Some(usage) = poll(pid)? {
        return Ok(WaitOutcome::TimedOut { usage });
    }

    let _ = kill(pid, Signal::SIGKILL);
    let usage = wait_blocking(pid)?;
    Ok(WaitOutcome::TimedOut { usage })
}

/// Non-blocking poll; `Some(usage)` once the child has been reaped
fn poll(pid: Pid) -> Result<Option<ResourceUsage>, ExecutionError> {
    match wait4(pid, libc::WNOHANG) {
        Ok((0, _, _)) => Ok(None),
        Ok((reaped, _, usage)) if reaped == pid.as_raw() => Ok(Some(usage)),
        Ok((other, _, _)) => Err(ExecutionError::Wait(format!(
            "wait4 reaped unexpected pid {}",
            other
        ))),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(ExecutionError::Wait(e.to_string())),
    }
}

/// Thin `libc::wait4` wrapper; nix exposes no rusage-capturing wait
fn wait4(pid: Pid, options: libc::c_int) -> io::Result<(libc::pid_t, libc::c_int, ResourceUsage)> {
    let mut status: libc::c_int = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

    let reaped = unsafe { libc::wait4(pid.as_raw(), &mut status, options, &mut usage) };
    if reaped < 0 {
        return Err(io::Error::last_os_error());
    }

    let max_rss_kb = if reaped == 0 {
        None
    } else {
        Some(usage.ru_maxrss as i64)
    };

    Ok((reaped, status, ResourceUsage { max_rss_kb }))
}
