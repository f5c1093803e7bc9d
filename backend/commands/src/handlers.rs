/// Built-in commands that only need the session's collaborators.
///
/// `help`, `plugins` and `exit` belong to the shell front-end and are not
/// defined here.
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use shellforge_config::redact;
use shellforge_core::CommandError;
use shellforge_executor::{CommandInvocation, CommandStatus};
use tracing::info;
use uuid::Uuid;

use crate::detection::{convert_value, split_words, strip_comment};
use crate::dispatch::{Command, CommandEnv};
use crate::table::CommandTable;
use crate::types::{CommandInput, CATEGORY_SYSTEM};

const DEFAULT_HISTORY: usize = 20;

/// Options `run` accepts before the executable.
const RUN_OPTIONS: [&str; 3] = ["timeout", "cwd", "host"];

/// Register `run`, `history`, `ops` and `settings` under `system`.
pub fn register_builtins(table: &CommandTable) -> Result<(), CommandError> {
    let env = table.env().clone();
    table.register(Arc::new(RunCommand::new(env.clone())), CATEGORY_SYSTEM)?;
    table.register(Arc::new(HistoryCommand::new(env.clone())), CATEGORY_SYSTEM)?;
    table.register(Arc::new(OpsCommand::new(env.clone())), CATEGORY_SYSTEM)?;
    table.register(Arc::new(SettingsCommand::new(env)), CATEGORY_SYSTEM)?;
    Ok(())
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn one_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > max {
        format!("{}…", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub struct RunCommand {
    env: CommandEnv,
}

impl RunCommand {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }

    /// Re-read the raw line so that only options before the executable
    /// belong to `run`. Everything from the executable on is its argv.
    fn leading_options(input: &CommandInput) -> Result<CommandInput> {
        let Some(tokens) = split_words(&strip_comment(&input.raw)) else {
            return Ok(input.clone());
        };
        let mut parsed = CommandInput::new(input.name.clone(), Vec::new());
        parsed.raw = input.raw.clone();
        let mut rest = tokens.into_iter().skip(1);
        while let Some(token) = rest.next() {
            if token == "--" {
                parsed.args.extend(rest.by_ref());
                break;
            }
            let Some(body) = token.strip_prefix("--") else {
                parsed.args.push(token);
                parsed.args.extend(rest.by_ref());
                break;
            };
            let (key, value) = match body.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => {
                    let value = rest
                        .next()
                        .ok_or_else(|| anyhow!("missing value for --{}", body))?;
                    (body.to_string(), value)
                }
            };
            if !RUN_OPTIONS.contains(&key.as_str()) {
                bail!("unknown run option --{}", key);
            }
            parsed.options.insert(key, convert_value(&value));
        }
        Ok(parsed)
    }

    fn invocation(input: &CommandInput) -> Result<CommandInvocation> {
        let input = &if input.raw.is_empty() {
            input.clone()
        } else {
            Self::leading_options(input)?
        };
        let (program, args) = input
            .args
            .split_first()
            .ok_or_else(|| anyhow!("missing executable"))?;
        let mut invocation = CommandInvocation::new(program.clone(), args.to_vec());
        if let Some(timeout) = input.option("timeout") {
            let secs = input
                .option_f64("timeout")
                .filter(|s| *s > 0.0)
                .ok_or_else(|| anyhow!("invalid --timeout value: {}", timeout))?;
            invocation = invocation.with_timeout(secs);
        }
        if let Some(cwd) = input.option_str("cwd") {
            invocation = invocation.with_cwd(cwd);
        }
        if let Some(host) = input.option_str("host") {
            invocation = invocation.with_host(host);
        }
        Ok(invocation)
    }
}

#[async_trait]
impl Command for RunCommand {
    fn name(&self) -> &str {
        "run"
    }

    fn summary(&self) -> &str {
        "Run an executable through the command pipeline"
    }

    fn usage(&self) -> String {
        "run [--timeout SECS] [--cwd DIR] [--host HOST] [--] <executable> [args...]".into()
    }

    async fn run(&self, input: &CommandInput) -> Result<()> {
        let invocation = Self::invocation(input)?;
        let result = self.env.pipeline.execute(invocation).await;

        if let Some(output) = result.output.as_deref().map(str::trim_end) {
            for line in output.lines() {
                self.env.ui.info(line);
            }
        }
        // Failures were already reported by the pipeline.
        match result.status {
            CommandStatus::Completed => {
                let secs = result.duration_secs().unwrap_or_default();
                self.env.ui.debug(&format!(
                    "{} completed in {:.2}s",
                    short_id(result.id),
                    secs
                ));
            }
            CommandStatus::Cancelled => {
                self.env
                    .ui
                    .warning(&format!("Command {} was cancelled", short_id(result.id)));
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

pub struct HistoryCommand {
    env: CommandEnv,
}

impl HistoryCommand {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for HistoryCommand {
    fn name(&self) -> &str {
        "history"
    }

    fn summary(&self) -> &str {
        "Show recent pipeline results"
    }

    fn usage(&self) -> String {
        "history [--limit N] | history purge".into()
    }

    async fn run(&self, input: &CommandInput) -> Result<()> {
        if input.subcommand() == Some("purge") {
            let removed = self.env.pipeline.purge_results(Utc::now());
            self.env.ui.success(&format!("Purged {} result(s)", removed));
            return Ok(());
        }

        let limit = match input.option("limit") {
            None => DEFAULT_HISTORY,
            Some(value) => value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .ok_or_else(|| anyhow!("invalid --limit value: {} (expected a positive integer)", value))?,
        };
        let results = self.env.pipeline.history(limit);
        if results.is_empty() {
            self.env.ui.info("No commands have run yet");
            return Ok(());
        }

        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                vec![
                    short_id(r.id),
                    r.status.to_string(),
                    r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    r.duration_secs()
                        .map(|s| format!("{:.2}s", s))
                        .unwrap_or_else(|| "-".into()),
                    r.error
                        .as_deref()
                        .or(r.output.as_deref())
                        .map(|t| one_line(t, 48))
                        .unwrap_or_default(),
                ]
            })
            .collect();
        self.env.ui.table(
            "Command history",
            &["ID", "Status", "Exit", "Duration", "Detail"],
            &rows,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ops
// ---------------------------------------------------------------------------

pub struct OpsCommand {
    env: CommandEnv,
}

impl OpsCommand {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }

    fn find(&self, prefix: &str) -> Option<Uuid> {
        let events = &self.env.events;
        events
            .active_operations()
            .into_keys()
            .chain(events.completed_operations().into_iter().map(|op| op.id))
            .find(|id| id.to_string().starts_with(prefix))
    }
}

#[async_trait]
impl Command for OpsCommand {
    fn name(&self) -> &str {
        "ops"
    }

    fn summary(&self) -> &str {
        "List event-bus operations or show one timeline"
    }

    fn usage(&self) -> String {
        "ops [<id-prefix> | purge]".into()
    }

    async fn run(&self, input: &CommandInput) -> Result<()> {
        let events = &self.env.events;
        match input.subcommand() {
            Some("purge") => {
                let removed = events.cleanup_completed(Some(Utc::now()));
                self.env.ui.success(&format!("Purged {} operation(s)", removed));
            }
            Some(prefix) => {
                let id = self
                    .find(prefix)
                    .ok_or_else(|| anyhow!("no operation matches '{}'", prefix))?;
                let op = events
                    .operation(id)
                    .with_context(|| format!("operation {} disappeared", id))?;
                self.env.ui.info(&format!(
                    "{} {} [{}]{}",
                    op.operation_type,
                    op.id,
                    op.status,
                    op.error.map(|e| format!(" {}", e)).unwrap_or_default()
                ));
                let rows: Vec<Vec<String>> = events
                    .get_operation_timeline(id)
                    .into_iter()
                    .map(|s| {
                        vec![
                            s.timestamp.format("%H:%M:%S%.3f").to_string(),
                            s.name,
                            one_line(&s.payload.to_string(), 60),
                        ]
                    })
                    .collect();
                self.env.ui.table("Timeline", &["Time", "Event", "Payload"], &rows);
            }
            None => {
                let mut ops: Vec<_> = events.active_operations().into_values().collect();
                ops.extend(events.completed_operations());
                ops.sort_by_key(|op| op.start_time);
                if ops.is_empty() {
                    self.env.ui.info("No operations recorded");
                    return Ok(());
                }
                let rows: Vec<Vec<String>> = ops
                    .iter()
                    .map(|op| {
                        vec![
                            short_id(op.id),
                            op.operation_type.clone(),
                            op.status.clone(),
                            op.events.len().to_string(),
                            op.duration_secs()
                                .map(|s| format!("{:.3}s", s))
                                .unwrap_or_else(|| "-".into()),
                        ]
                    })
                    .collect();
                self.env.ui.table(
                    "Operations",
                    &["ID", "Type", "Status", "Events", "Duration"],
                    &rows,
                );
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

pub struct SettingsCommand {
    env: CommandEnv,
}

impl SettingsCommand {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for SettingsCommand {
    fn name(&self) -> &str {
        "settings"
    }

    fn summary(&self) -> &str {
        "Inspect and change configuration"
    }

    fn usage(&self) -> String {
        "settings show | get <path> | set <path> <value> | save".into()
    }

    async fn run(&self, input: &CommandInput) -> Result<()> {
        let settings = &self.env.settings;
        let args: Vec<&str> = input.args.iter().map(String::as_str).collect();
        match args.as_slice() {
            [] | ["show"] => {
                let doc = serde_yaml::to_string(&redact(&settings.snapshot()))?;
                for line in doc.lines() {
                    self.env.ui.info(line);
                }
            }
            ["get", path] => match settings.get(path) {
                Some(value) => self.env.ui.info(&format!("{} = {}", path, redact(&value))),
                None => bail!("setting '{}' is not set", path),
            },
            ["set", path, value] => {
                settings.set(path, convert_value(value))?;
                info!(setting = %path, "[Settings] Updated from shell");
                self.env.ui.success(&format!("{} updated", path));
            }
            ["save"] => {
                settings.save().await?;
                match settings.path() {
                    Some(path) => self
                        .env
                        .ui
                        .success(&format!("Settings saved to {}", path.display())),
                    None => self.env.ui.warning("Settings are in-memory only"),
                }
            }
            _ => bail!("usage: {}", self.usage()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detect_command;
    use crate::table::CommandHost;
    use serde_json::json;
    use shellforge_core::{CapturedUi, MessageLevel};

    fn setup() -> (Arc<CapturedUi>, CommandTable) {
        let ui = Arc::new(CapturedUi::new());
        let table = CommandTable::new(CommandEnv::standalone(ui.clone()));
        register_builtins(&table).unwrap();
        (ui, table)
    }

    async fn dispatch(table: &CommandTable, line: &str) -> Result<(), CommandError> {
        let input = detect_command(line).unwrap();
        table.dispatch(&input).await
    }

    #[tokio::test]
    async fn test_builtins_are_system_commands() {
        let (_ui, table) = setup();
        let mut names = table.category_commands("system");
        names.sort();
        assert_eq!(names, vec!["history", "ops", "run", "settings"]);
        assert!(table.get_command("run").is_some());
    }

    #[tokio::test]
    async fn test_run_prints_output_and_records_history() {
        let (ui, table) = setup();
        dispatch(&table, "run echo hi").await.unwrap();
        assert!(ui.messages_at(MessageLevel::Info).contains(&"hi".to_string()));

        let history = table.env().pipeline.history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, CommandStatus::Completed);

        ui.clear();
        dispatch(&table, "history").await.unwrap();
        assert!(ui.contains("completed"));
    }

    #[tokio::test]
    async fn test_run_passes_options_to_invocation() {
        let input = detect_command("run --timeout 2 --cwd /tmp -- sh -c 'pwd'").unwrap();
        let inv = RunCommand::invocation(&input).unwrap();
        assert_eq!(inv.name, "sh");
        assert_eq!(inv.args, vec!["-c", "pwd"]);
        assert_eq!(inv.timeout, Some(2.0));
        assert_eq!(inv.cwd.as_deref(), Some("/tmp"));

        let input = detect_command("run --timeout abc sleep 1").unwrap();
        assert!(RunCommand::invocation(&input).is_err());
        let input = detect_command("run --verbose sleep 1").unwrap();
        assert!(RunCommand::invocation(&input).is_err());
    }

    #[test]
    fn test_run_keeps_executable_arguments_verbatim() {
        let input = detect_command("run sh -c 'exit 4'").unwrap();
        let inv = RunCommand::invocation(&input).unwrap();
        assert_eq!(inv.name, "sh");
        assert_eq!(inv.args, vec!["-c", "exit 4"]);

        let input = detect_command("run ls -la / # trailing note").unwrap();
        let inv = RunCommand::invocation(&input).unwrap();
        assert_eq!(inv.name, "ls");
        assert_eq!(inv.args, vec!["-la", "/"]);

        let input = detect_command("run --host=edge grep --timeout 5 -e x").unwrap();
        let inv = RunCommand::invocation(&input).unwrap();
        assert_eq!(inv.host.as_deref(), Some("edge"));
        assert_eq!(inv.timeout, None);
        assert_eq!(inv.args, vec!["--timeout", "5", "-e", "x"]);
    }

    #[tokio::test]
    async fn test_history_rejects_bad_limit() {
        let (ui, table) = setup();
        dispatch(&table, "run echo first-entry").await.unwrap();
        dispatch(&table, "run echo second-entry").await.unwrap();
        for bad in ["2.7", "abc", "0", "-3"] {
            let err = dispatch(&table, &format!("history --limit={}", bad))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("invalid --limit"), "{bad}: {err}");
        }

        ui.clear();
        dispatch(&table, "history --limit 1").await.unwrap();
        assert!(ui.contains("second-entry"));
        assert!(!ui.contains("first-entry"));
    }

    #[tokio::test]
    async fn test_run_without_executable_fails() {
        let (_ui, table) = setup();
        let err = dispatch(&table, "run").await.unwrap_err();
        assert!(err.to_string().contains("missing executable"));
    }

    #[tokio::test]
    async fn test_failed_run_is_reported_once() {
        let (ui, table) = setup();
        dispatch(&table, "run sh -c 'exit 4'").await.unwrap();
        let errors = ui.messages_at(MessageLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(table.env().pipeline.history(1)[0].exit_code, Some(4));
    }

    #[tokio::test]
    async fn test_settings_get_set() {
        let (ui, table) = setup();
        dispatch(&table, "settings set ui.prompt 'sf> '").await.unwrap();
        dispatch(&table, "settings set system.command_timeout 30").await.unwrap();
        assert_eq!(table.env().settings.get("ui.prompt"), Some(json!("sf> ")));
        assert_eq!(table.env().settings.get("system.command_timeout"), Some(json!(30)));

        dispatch(&table, "settings get ui.prompt").await.unwrap();
        assert!(ui.contains("ui.prompt"));
        assert!(dispatch(&table, "settings get missing.key").await.is_err());
        assert!(dispatch(&table, "settings frobnicate").await.is_err());
    }

    #[tokio::test]
    async fn test_ops_lists_and_shows_timeline() {
        let (ui, table) = setup();
        let events = table.env().events.clone();
        let id = events.start_operation("demo", Default::default());
        events
            .emit(shellforge_core::Event::new("demo.step", json!({"n": 1})).with_operation(id))
            .unwrap();
        events.complete_operation(id, "completed", None).unwrap();

        dispatch(&table, "ops").await.unwrap();
        assert!(ui.contains("demo"));

        ui.clear();
        let prefix = id.to_string()[..8].to_string();
        dispatch(&table, &format!("ops {}", prefix)).await.unwrap();
        assert!(ui.contains("demo.step"));

        dispatch(&table, "ops purge").await.unwrap();
        assert!(events.completed_operations().is_empty());
        assert!(dispatch(&table, "ops deadbeef").await.is_err());
    }
}
