//! Execution strategies: where and how an invocation actually runs.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::types::{CommandInvocation, CommandResult, CommandStatus};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Fires the paired [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by a strategy while it runs.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = cancel_pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|c| *c).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

// ---------------------------------------------------------------------------
// Strategy trait
// ---------------------------------------------------------------------------

/// Runs an invocation to a terminal [`CommandResult`].
///
/// Failures are reported in the result (status `FAILED`), never as a panic
/// or error value. A strategy that observes `cancel` should stop and return
/// a `CANCELLED` result.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, invocation: &CommandInvocation, cancel: &CancelSignal)
        -> CommandResult;
}

// ---------------------------------------------------------------------------
// Local processes
// ---------------------------------------------------------------------------

/// Spawns the named executable on this machine.
#[derive(Debug, Default, Clone)]
pub struct LocalExecutor;

enum Waited {
    Done(std::io::Result<Output>),
    TimedOut,
    Cancelled,
}

async fn wait_limited<F>(wait: F, limit: Option<Duration>) -> Waited
where
    F: std::future::Future<Output = std::io::Result<Output>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(res) => Waited::Done(res),
            Err(_) => Waited::TimedOut,
        },
        None => Waited::Done(wait.await),
    }
}

#[async_trait]
impl ExecutionStrategy for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(
        &self,
        invocation: &CommandInvocation,
        cancel: &CancelSignal,
    ) -> CommandResult {
        let id = invocation.id;
        let start = Utc::now();

        let mut cmd = Command::new(&invocation.name);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        info!(command_id = %id, command = %invocation.name, args = ?invocation.args, "Executing local command");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %invocation.name, error = %e, "Failed to spawn");
                return CommandResult::failed(
                    id,
                    start,
                    Some(-1),
                    format!("failed to start {}: {}", invocation.name, e),
                );
            }
        };

        let limit = invocation.timeout.and_then(|secs| {
            let limit = Duration::try_from_secs_f64(secs).ok();
            if limit.is_none() {
                warn!(timeout = secs, "Ignoring invalid timeout");
            }
            limit
        });

        // Dropping the wait future drops the child, which kills it.
        let waited = tokio::select! {
            waited = wait_limited(child.wait_with_output(), limit) => waited,
            _ = cancel.cancelled() => Waited::Cancelled,
        };

        match waited {
            Waited::Done(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let code = output.status.code().unwrap_or(-1);
                debug!(command_id = %id, exit_code = code, "Local command exited");
                if output.status.success() {
                    CommandResult::completed(id, start, code, stdout)
                } else {
                    let error = if stderr.trim().is_empty() {
                        format!("{} exited with status {}", invocation.name, code)
                    } else {
                        stderr
                    };
                    let mut result = CommandResult::failed(id, start, Some(code), error);
                    result.output = Some(stdout);
                    result
                }
            }
            Waited::Done(Err(e)) => CommandResult::failed(id, start, Some(-1), e.to_string()),
            Waited::TimedOut => {
                let secs = invocation.timeout.unwrap_or_default();
                warn!(command_id = %id, timeout = secs, "Local command timed out");
                CommandResult::failed(
                    id,
                    start,
                    Some(-1),
                    format!("Command timed out after {} seconds", secs),
                )
            }
            Waited::Cancelled => {
                info!(command_id = %id, "Local command cancelled; child killed");
                let mut result = CommandResult::cancelled(id);
                result.start_time = start;
                result
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Remote hosts
// ---------------------------------------------------------------------------

/// Placeholder for host-directed execution (SSH, WinRM, agents).
/// Every invocation fails immediately.
#[derive(Debug, Default, Clone)]
pub struct RemoteExecutor;

pub const REMOTE_NOT_IMPLEMENTED: &str = "Remote execution not yet implemented";

#[async_trait]
impl ExecutionStrategy for RemoteExecutor {
    fn name(&self) -> &str {
        "remote"
    }

    async fn execute(
        &self,
        invocation: &CommandInvocation,
        _cancel: &CancelSignal,
    ) -> CommandResult {
        debug!(command_id = %invocation.id, host = ?invocation.host, "Remote execution requested");
        let now = Utc::now();
        let mut result = CommandResult::queued(invocation.id);
        result.status = CommandStatus::Failed;
        result.start_time = now;
        result.end_time = Some(now);
        result.error = Some(REMOTE_NOT_IMPLEMENTED.to_string());
        result
    }
}
