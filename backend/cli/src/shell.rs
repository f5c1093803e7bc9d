//! The shell front-end: wires the collaborators together, owns the live
//! command table and the plugin manager, and runs the read loop.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use shellforge_commands::{
    detect_command, register_builtins, CommandEnv, CommandInput, CommandSpec, CommandTable,
    CATEGORY_SYSTEM,
};
use shellforge_config::{Settings, DEFAULT_PROMPT};
use shellforge_core::{ErrorCategory, ErrorReporter, EventBus, ShellError, Ui};
use shellforge_executor::CommandPipeline;
use shellforge_hooks::{DenyListHook, HookPhase, LoggingHook};
use shellforge_logging::EventAuditLog;
use shellforge_plugins::{PluginCatalog, PluginContext, PluginDiscovery, PluginManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{help_cmd, plugins_cmd};

/// What the read loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    ui: Arc<dyn Ui>,
    settings: Settings,
    reporter: Arc<ErrorReporter>,
    table: Arc<CommandTable>,
    plugins: PluginManager,
    audit: Arc<EventAuditLog>,
}

impl Shell {
    /// Build a session. `plugins_dir` overrides `plugins.paths`.
    pub async fn build(
        ui: Arc<dyn Ui>,
        settings: Settings,
        catalog: PluginCatalog,
        plugins_dir: Option<PathBuf>,
        debug: bool,
    ) -> Result<Self> {
        let events = EventBus::new();
        let audit = EventAuditLog::attach(&events);

        let reporter = Arc::new(ErrorReporter::new(ui.clone()));
        reporter.set_debug(debug || settings.get_or("system.debug", false));

        let timeout: Option<f64> = settings.get_or("system.command_timeout", None);
        let pipeline = CommandPipeline::new(events.clone(), reporter.clone())
            .with_default_timeout(timeout);
        for phase in [HookPhase::PreExecute, HookPhase::PostExecute, HookPhase::OnError] {
            pipeline
                .register_hook(phase, Arc::new(LoggingHook::new("Pipeline")))
                .await;
        }
        let blocked: Vec<String> = settings.get_or("system.blocked_commands", Vec::new());
        if !blocked.is_empty() {
            info!(blocked = ?blocked, "[Shell] Command deny list active");
            pipeline
                .register_hook(HookPhase::PreExecute, Arc::new(DenyListHook::new(blocked)))
                .await;
        }

        let env = CommandEnv::new(ui.clone(), settings.clone(), events.clone(), pipeline);
        let table = Arc::new(CommandTable::new(env));
        register_builtins(&table)?;
        for (name, summary) in [
            ("help", help_cmd::SUMMARY),
            ("plugins", plugins_cmd::SUMMARY),
            ("exit", "Leave the shell"),
            ("quit", "Leave the shell"),
        ] {
            table.reserve(CommandSpec::builtin(name, summary), CATEGORY_SYSTEM)?;
        }

        let discovery = match plugins_dir {
            Some(dir) => PluginDiscovery::new(dir, catalog),
            None => PluginDiscovery::from_settings(&settings, catalog),
        };
        let ctx = PluginContext::new(ui.clone(), settings.clone(), events);
        let plugins = PluginManager::new(ctx, table.clone(), reporter.clone(), discovery);

        Ok(Self {
            ui,
            settings,
            reporter,
            table,
            plugins,
            audit,
        })
    }

    /// Load plugins according to settings.
    pub async fn start(&mut self) {
        let loaded = self.plugins.load_configured().await;
        info!(
            plugins = ?loaded,
            commands = self.table().listing().len(),
            "[Shell] Session started"
        );
        if self.plugins().load_order().is_empty() {
            debug!(root = %self.plugins.discovery().root().display(), "[Shell] No plugins loaded");
        }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn audited_events(&self) -> u64 {
        self.audit.recorded()
    }

    fn prompt(&self) -> String {
        self.settings.get_or("ui.prompt", DEFAULT_PROMPT.to_string())
    }

    /// Parse and run one input line. Errors are reported, never returned.
    pub async fn execute_line(&mut self, line: &str) -> Flow {
        let Some(input) = detect_command(line) else {
            return Flow::Continue;
        };
        debug!(command = %input.name, "[Shell] Input");

        let outcome = match input.name.as_str() {
            "exit" | "quit" => return Flow::Exit,
            "help" => help_cmd::run(&self.table, self.ui.as_ref(), &input),
            "plugins" => self.plugins_builtin(&input).await,
            _ => self.table.dispatch(&input).await,
        };
        if let Err(e) = outcome {
            self.reporter
                .report(&ShellError::from(e), ErrorCategory::Command, Some(input.name.as_str()));
        }
        Flow::Continue
    }

    async fn plugins_builtin(
        &mut self,
        input: &CommandInput,
    ) -> Result<(), shellforge_core::CommandError> {
        if input.flag("help") {
            self.ui
                .info(&format!("{}\n\n{}", plugins_cmd::SUMMARY, plugins_cmd::USAGE));
            return Ok(());
        }
        plugins_cmd::run(&mut self.plugins, self.ui.as_ref(), input).await
    }

    /// Run each line in turn, stopping early on `exit`.
    pub async fn run_lines(&mut self, lines: &[String]) {
        for line in lines {
            if self.execute_line(line).await == Flow::Exit {
                break;
            }
        }
        self.shutdown().await;
    }

    /// Interactive read loop over stdin. Ends on EOF or `exit`.
    pub async fn run_interactive(&mut self) -> Result<()> {
        self.ui
            .info("shellforge: type 'help' for commands, 'exit' to leave.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}", self.prompt());
            let _ = std::io::stdout().flush();
            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };
            if self.execute_line(&line).await == Flow::Exit {
                break;
            }
        }
        self.shutdown().await;
        Ok(())
    }

    /// Unload every plugin and persist settings.
    pub async fn shutdown(&mut self) {
        let unloaded = self.plugins.cleanup().await;
        if let Err(e) = self.settings.save().await {
            warn!(error = %e, "[Shell] Could not save settings");
            self.reporter
                .report(&ShellError::from(e), ErrorCategory::Configuration, Some("save"));
        }
        info!(plugins = unloaded, events = self.audited_events(), "[Shell] Session ended");
    }
}
