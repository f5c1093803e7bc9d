//! Command pipeline.
//!
//! Drives one invocation through QUEUED → RUNNING → COMPLETED / FAILED /
//! CANCELLED, firing hooks and bus events along the way. Whatever happens,
//! the result is stored and the invocation leaves the active set before
//! `execute` returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde_json::json;
use shellforge_core::{
    names, CommandError, ErrorCategory, ErrorReporter, Event, EventBus, EventError, ShellError,
};
use shellforge_hooks::{Hook, HookPhase, HookPipeline};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::strategy::{
    cancel_pair, CancelHandle, CancelSignal, ExecutionStrategy, LocalExecutor, RemoteExecutor,
};
use crate::types::{CommandInvocation, CommandResult, CommandStatus};

struct ActiveCommand {
    invocation: CommandInvocation,
    cancel: CancelHandle,
}

#[derive(Default)]
struct PipelineState {
    active: HashMap<Uuid, ActiveCommand>,
    results: HashMap<Uuid, CommandResult>,
    /// Result ids in the order they were stored.
    order: Vec<Uuid>,
}

impl PipelineState {
    fn store(&mut self, result: CommandResult) {
        if self.results.insert(result.id, result.clone()).is_none() {
            self.order.push(result.id);
        }
    }
}

enum Lifecycle {
    Finished,
    Cancelled,
}

/// Cloneable handle; clones share the active set, results and hooks.
#[derive(Clone)]
pub struct CommandPipeline {
    state: Arc<Mutex<PipelineState>>,
    hooks: HookPipeline,
    events: EventBus,
    reporter: Arc<ErrorReporter>,
    local: Arc<dyn ExecutionStrategy>,
    remote: Arc<dyn ExecutionStrategy>,
    default_timeout: Option<f64>,
}

impl CommandPipeline {
    pub fn new(events: EventBus, reporter: Arc<ErrorReporter>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PipelineState::default())),
            hooks: HookPipeline::default(),
            events,
            reporter,
            local: Arc::new(LocalExecutor),
            remote: Arc::new(RemoteExecutor),
            default_timeout: None,
        }
    }

    pub fn with_local_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.local = strategy;
        self
    }

    pub fn with_remote_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.remote = strategy;
        self
    }

    /// Timeout applied to invocations that do not set one.
    pub fn with_default_timeout(mut self, seconds: Option<f64>) -> Self {
        self.default_timeout = seconds;
        self
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    pub async fn register_hook(&self, phase: HookPhase, hook: Arc<dyn Hook>) {
        self.hooks.registry.register(phase, hook).await;
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run `invocation` to a terminal state and return the stored result.
    pub async fn execute(&self, mut invocation: CommandInvocation) -> CommandResult {
        if invocation.timeout.is_none() {
            invocation.timeout = self.default_timeout;
        }
        let id = invocation.id;
        let (cancel, signal) = cancel_pair();
        let mut result = CommandResult::queued(id);

        self.lock().active.insert(
            id,
            ActiveCommand {
                invocation: invocation.clone(),
                cancel,
            },
        );
        debug!(command_id = %id, command = %invocation.name, "[Pipeline] Queued");

        match self.run_lifecycle(&invocation, &mut result, &signal).await {
            Ok(Lifecycle::Finished) => {}
            Ok(Lifecycle::Cancelled) => {
                debug!(command_id = %id, "[Pipeline] Invocation was cancelled");
                if !result.status.is_terminal() {
                    result = CommandResult::cancelled(id);
                }
            }
            Err(err) if signal.is_cancelled() => {
                debug!(command_id = %id, error = %format!("{:#}", err), "[Pipeline] Error after cancel ignored");
            }
            Err(err) => self.fail(&invocation, &mut result, err).await,
        }

        self.finish(result)
    }

    async fn run_lifecycle(
        &self,
        invocation: &CommandInvocation,
        result: &mut CommandResult,
        signal: &CancelSignal,
    ) -> anyhow::Result<Lifecycle> {
        self.hooks.pre_execute(invocation.to_payload()).await?;
        if signal.is_cancelled() {
            return Ok(Lifecycle::Cancelled);
        }

        self.emit(Event::new(
            names::COMMAND_STARTED,
            json!({
                "command_id": invocation.id.to_string(),
                "command": invocation.name,
                "args": invocation.args,
                "host": invocation.host,
            }),
        ))?;

        result.status = CommandStatus::Running;

        let strategy = match invocation.remote_host() {
            Some(_) => &self.remote,
            None => &self.local,
        };
        debug!(command_id = %invocation.id, strategy = strategy.name(), "[Pipeline] Running");
        *result = strategy.execute(invocation, signal).await;
        result.id = invocation.id;
        if signal.is_cancelled() {
            return Ok(Lifecycle::Cancelled);
        }

        match result.status {
            CommandStatus::Cancelled => return Ok(Lifecycle::Cancelled),
            CommandStatus::Failed => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "command failed".to_string());
                return Err(anyhow!(message));
            }
            _ => {}
        }
        result.finish(CommandStatus::Completed);

        self.hooks
            .post_execute(invocation.to_payload(), result.to_outcome())
            .await?;
        if signal.is_cancelled() {
            return Ok(Lifecycle::Cancelled);
        }

        self.emit(Event::new(
            names::COMMAND_COMPLETED,
            json!({
                "command_id": invocation.id.to_string(),
                "exit_code": result.exit_code,
                "duration": result.duration_secs(),
            }),
        ))?;

        info!(command_id = %invocation.id, command = %invocation.name, "[Pipeline] Completed");
        Ok(Lifecycle::Finished)
    }

    async fn fail(
        &self,
        invocation: &CommandInvocation,
        result: &mut CommandResult,
        err: anyhow::Error,
    ) {
        let message = format!("{:#}", err);
        result.finish(CommandStatus::Failed);
        if result.error.is_none() {
            result.error = Some(message.clone());
        }
        warn!(command_id = %invocation.id, command = %invocation.name, error = %message, "[Pipeline] Failed");

        if let Err(hook_err) = self
            .hooks
            .on_error(invocation.to_payload(), result.to_outcome())
            .await
        {
            warn!(command_id = %invocation.id, error = %hook_err, "[Pipeline] on_error hook failed");
            result
                .metadata
                .insert("hook_error".into(), json!(format!("{:#}", hook_err)));
        }

        if let Err(emit_err) = self.emit(Event::new(
            names::COMMAND_FAILED,
            json!({
                "command_id": invocation.id.to_string(),
                "error": message,
                "exit_code": result.exit_code,
            }),
        )) {
            warn!(command_id = %invocation.id, error = %emit_err, "[Pipeline] command.failed handler failed");
            result
                .metadata
                .insert("event_error".into(), json!(emit_err.to_string()));
        }

        let report_err = ShellError::Command(CommandError::Failed {
            command: invocation.name.clone(),
            args: invocation.args.clone(),
            message,
            exit_code: result.exit_code,
        });
        self.reporter
            .report(&report_err, ErrorCategory::Command, Some("execute"));
    }

    /// Store the result and drop the invocation from the active set. A
    /// result stored by `cancel_command` is kept.
    fn finish(&self, result: CommandResult) -> CommandResult {
        let mut state = self.lock();
        state.active.remove(&result.id);
        if let Some(existing) = state.results.get(&result.id) {
            if existing.status == CommandStatus::Cancelled {
                return existing.clone();
            }
        }
        state.store(result.clone());
        result
    }

    fn emit(&self, event: Event) -> Result<(), EventError> {
        self.events.emit(event)
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Mark an active invocation CANCELLED and signal its strategy.
    pub fn cancel_command(&self, id: Uuid) -> Result<(), CommandError> {
        let entry = {
            let mut state = self.lock();
            let entry = state
                .active
                .remove(&id)
                .ok_or(CommandError::NotActive(id))?;
            state.store(CommandResult::cancelled(id));
            entry
        };
        entry.cancel.cancel();
        info!(command_id = %id, command = %entry.invocation.name, "[Pipeline] Cancelled");

        if let Err(e) = self.emit(Event::new(
            names::COMMAND_CANCELLED,
            json!({ "command_id": id.to_string() }),
        )) {
            warn!(command_id = %id, error = %e, "[Pipeline] command.cancelled handler failed");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn get_result(&self, id: Uuid) -> Option<CommandResult> {
        self.lock().results.get(&id).cloned()
    }

    pub fn get_active_commands(&self) -> HashMap<Uuid, CommandInvocation> {
        self.lock()
            .active
            .iter()
            .map(|(id, entry)| (*id, entry.invocation.clone()))
            .collect()
    }

    /// The most recent `limit` results, oldest first.
    pub fn history(&self, limit: usize) -> Vec<CommandResult> {
        let state = self.lock();
        let skip = state.order.len().saturating_sub(limit);
        state
            .order
            .iter()
            .skip(skip)
            .filter_map(|id| state.results.get(id).cloned())
            .collect()
    }

    /// Drop stored results that finished before `before`. Returns how many
    /// were removed.
    pub fn purge_results(&self, before: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let initial = state.results.len();
        state
            .results
            .retain(|_, r| r.end_time.map_or(true, |end| end >= before));
        let PipelineState { results, order, .. } = &mut *state;
        order.retain(|id| results.contains_key(id));
        initial - results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shellforge_core::{from_fn, CapturedUi};
    use shellforge_hooks::hook_fn;
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    fn pipeline() -> (Arc<CapturedUi>, EventBus, CommandPipeline) {
        let ui = Arc::new(CapturedUi::new());
        let reporter = Arc::new(ErrorReporter::new(ui.clone()));
        let bus = EventBus::new();
        let pipeline = CommandPipeline::new(bus.clone(), reporter);
        (ui, bus, pipeline)
    }

    fn record_events(bus: &EventBus) -> Arc<StdMutex<Vec<String>>> {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(
            "*",
            from_fn("recorder", move |e: &Event| {
                sink.lock().unwrap().push(e.name.clone());
                Ok(())
            }),
        );
        seen
    }

    fn assert_terminal(result: &CommandResult) {
        assert!(result.status.is_terminal());
        let end = result.end_time.expect("terminal result has end time");
        assert!(end >= result.start_time);
    }

    #[tokio::test]
    async fn test_echo_completes() {
        let (_ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);

        let inv = CommandInvocation::new("echo", vec!["hi".into()]);
        let id = inv.id;
        let result = pipeline.execute(inv).await;

        assert_eq!(result.status, CommandStatus::Completed);
        assert!(result.output.as_deref().unwrap_or_default().contains("hi"));
        assert_terminal(&result);
        assert!(pipeline.get_active_commands().is_empty());
        assert_eq!(pipeline.get_result(id).unwrap().status, CommandStatus::Completed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["command.started", "command.completed"]
        );
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let (ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);

        let started = Instant::now();
        let result = pipeline
            .execute(CommandInvocation::new("sleep", vec!["5".into()]).with_timeout(0.3))
            .await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.status, CommandStatus::Failed);
        assert_eq!(result.exit_code, Some(-1));
        assert!(result.error.unwrap().contains("timed out after 0.3"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["command.started", "command.failed"]
        );
        assert!(ui.contains("Command error"));
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let (_ui, _bus, pipeline) = pipeline();
        let pipeline = pipeline.with_default_timeout(Some(0.2));
        let result = pipeline
            .execute(CommandInvocation::new("sleep", vec!["5".into()]))
            .await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert_eq!(result.exit_code, Some(-1));
    }

    #[tokio::test]
    async fn test_remote_host_uses_stub() {
        let (_ui, _bus, pipeline) = pipeline();
        let result = pipeline
            .execute(CommandInvocation::new("uptime", vec![]).with_host("build-01"))
            .await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert!(result.error.unwrap().contains("not yet implemented"));
        assert_terminal(&pipeline.history(1)[0]);
    }

    #[tokio::test]
    async fn test_pre_hook_error_fails_and_cleans_up() {
        let (ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);
        pipeline
            .register_hook(
                HookPhase::PreExecute,
                hook_fn("gate", |_| anyhow::bail!("not today")),
            )
            .await;

        let inv = CommandInvocation::new("echo", vec!["hi".into()]);
        let id = inv.id;
        let result = pipeline.execute(inv).await;

        assert_eq!(result.status, CommandStatus::Failed);
        assert!(result.error.unwrap().contains("not today"));
        assert!(!pipeline.get_active_commands().contains_key(&id));
        assert_terminal(&pipeline.get_result(id).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec!["command.failed"]);
        assert!(ui.contains("Try 'help echo' for usage information"));
    }

    #[tokio::test]
    async fn test_hooks_see_each_phase() {
        let (_ui, _bus, pipeline) = pipeline();
        let phases = Arc::new(StdMutex::new(Vec::new()));
        for phase in [HookPhase::PreExecute, HookPhase::PostExecute, HookPhase::OnError] {
            let phases = phases.clone();
            pipeline
                .register_hook(
                    phase,
                    hook_fn(phase.as_str(), move |p| {
                        phases.lock().unwrap().push(p.phase());
                        Ok(())
                    }),
                )
                .await;
        }

        pipeline
            .execute(CommandInvocation::new("true", vec![]))
            .await;
        pipeline
            .execute(CommandInvocation::new("false", vec![]))
            .await;

        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                HookPhase::PreExecute,
                HookPhase::PostExecute,
                HookPhase::PreExecute,
                HookPhase::OnError
            ]
        );
    }

    #[tokio::test]
    async fn test_post_hook_error_turns_into_failure() {
        let (_ui, _bus, pipeline) = pipeline();
        pipeline
            .register_hook(
                HookPhase::PostExecute,
                hook_fn("audit", |_| anyhow::bail!("audit store offline")),
            )
            .await;
        let result = pipeline
            .execute(CommandInvocation::new("echo", vec!["x".into()]))
            .await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.error.unwrap().contains("audit store offline"));
    }

    #[tokio::test]
    async fn test_failing_event_handler_fails_invocation() {
        let (_ui, bus, pipeline) = pipeline();
        bus.subscribe(
            names::COMMAND_STARTED,
            from_fn("broken", |_| anyhow::bail!("subscriber crashed")),
        );
        let result = pipeline
            .execute(CommandInvocation::new("echo", vec![]))
            .await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert!(result.error.unwrap().contains("broken"));
        assert!(pipeline.get_active_commands().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_unknown_command_fails() {
        let (_ui, _bus, pipeline) = pipeline();
        let id = Uuid::new_v4();
        assert!(matches!(
            pipeline.cancel_command(id),
            Err(CommandError::NotActive(got)) if got == id
        ));
    }

    #[tokio::test]
    async fn test_cancel_from_pre_hook_is_kept() {
        let (_ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);
        let handle = pipeline.clone();
        pipeline
            .register_hook(
                HookPhase::PreExecute,
                hook_fn("cancel-self", move |p| {
                    handle.cancel_command(p.invocation().command_id)?;
                    Ok(())
                }),
            )
            .await;

        let inv = CommandInvocation::new("echo", vec!["never".into()]);
        let id = inv.id;
        let result = pipeline.execute(inv).await;

        assert_eq!(result.status, CommandStatus::Cancelled);
        assert_eq!(pipeline.get_result(id).unwrap().status, CommandStatus::Cancelled);
        assert!(pipeline.get_active_commands().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["command.cancelled"]);
    }

    #[tokio::test]
    async fn test_cancel_from_post_hook_emits_no_completion() {
        let (ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);
        let handle = pipeline.clone();
        pipeline
            .register_hook(
                HookPhase::PostExecute,
                hook_fn("cancel-after-run", move |p| {
                    handle.cancel_command(p.invocation().command_id)?;
                    Ok(())
                }),
            )
            .await;

        let inv = CommandInvocation::new("echo", vec!["late".into()]);
        let id = inv.id;
        let result = pipeline.execute(inv).await;

        assert_eq!(result.status, CommandStatus::Cancelled);
        assert_eq!(pipeline.get_result(id).unwrap().status, CommandStatus::Cancelled);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["command.started", "command.cancelled"]
        );
        assert!(!ui.contains("Command error"));
    }

    #[tokio::test]
    async fn test_cancel_then_failing_post_hook_is_not_reported() {
        let (ui, bus, pipeline) = pipeline();
        let seen = record_events(&bus);
        let handle = pipeline.clone();
        pipeline
            .register_hook(
                HookPhase::PostExecute,
                hook_fn("cancel-then-fail", move |p| {
                    handle.cancel_command(p.invocation().command_id)?;
                    anyhow::bail!("audit store offline")
                }),
            )
            .await;

        let result = pipeline
            .execute(CommandInvocation::new("echo", vec!["x".into()]))
            .await;

        assert_eq!(result.status, CommandStatus::Cancelled);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["command.started", "command.cancelled"]
        );
        assert!(!ui.contains("Command error"));
    }

    #[tokio::test]
    async fn test_cancel_running_command_kills_child() {
        let (_ui, _bus, pipeline) = pipeline();
        let inv = CommandInvocation::new("sleep", vec!["5".into()]);
        let id = inv.id;
        let runner = pipeline.clone();
        let started = Instant::now();
        let task = tokio::spawn(async move { runner.execute(inv).await });

        let deadline = Instant::now() + Duration::from_secs(2);
        while !pipeline.get_active_commands().contains_key(&id) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.cancel_command(id).unwrap();

        let result = task.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.status, CommandStatus::Cancelled);
        assert_terminal(&result);
    }

    struct SlowRemote;

    #[async_trait]
    impl ExecutionStrategy for SlowRemote {
        fn name(&self) -> &str {
            "slow-remote"
        }

        async fn execute(
            &self,
            invocation: &CommandInvocation,
            cancel: &CancelSignal,
        ) -> CommandResult {
            cancel.cancelled().await;
            let mut result = CommandResult::cancelled(invocation.id);
            result.metadata.insert("observed".into(), json!(true));
            result
        }
    }

    #[tokio::test]
    async fn test_custom_remote_strategy_observes_cancel() {
        let (_ui, _bus, pipeline) = pipeline();
        let pipeline = pipeline.with_remote_strategy(Arc::new(SlowRemote));
        let inv = CommandInvocation::new("uptime", vec![]).with_host("edge");
        let id = inv.id;
        let runner = pipeline.clone();
        let task = tokio::spawn(async move { runner.execute(inv).await });

        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.get_result(id).is_none() && Instant::now() < deadline {
            if pipeline.get_active_commands().contains_key(&id) {
                pipeline.cancel_command(id).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let result = task.await.unwrap();
        assert_eq!(result.status, CommandStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_history_and_purge() {
        let (_ui, _bus, pipeline) = pipeline();
        for word in ["a", "b", "c"] {
            pipeline
                .execute(CommandInvocation::new("echo", vec![word.into()]))
                .await;
        }
        let recent = pipeline.history(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[1].output.as_deref().unwrap_or_default().contains('c'));

        assert_eq!(pipeline.purge_results(Utc::now() - chrono::Duration::hours(1)), 0);
        assert_eq!(pipeline.purge_results(Utc::now() + chrono::Duration::seconds(1)), 3);
        assert!(pipeline.history(10).is_empty());
    }
}
