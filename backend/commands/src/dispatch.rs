/// Command capability and the per-session router.
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shellforge_config::Settings;
use shellforge_core::{ErrorReporter, EventBus, Ui};
use shellforge_executor::CommandPipeline;

use crate::types::CommandInput;

// ---------------------------------------------------------------------------
// Command trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn summary(&self) -> &str {
        ""
    }

    fn usage(&self) -> String {
        self.name().to_string()
    }

    /// Text shown for `help <name>` and `<name> --help`.
    fn help(&self) -> String {
        let mut text = format!("Usage: {}", self.usage());
        if !self.summary().is_empty() {
            text = format!("{}\n\n{}", self.summary(), text);
        }
        text
    }

    async fn run(&self, input: &CommandInput) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Collaborators a command instance is built with.
#[derive(Clone)]
pub struct CommandEnv {
    pub ui: Arc<dyn Ui>,
    pub settings: Settings,
    pub events: EventBus,
    pub pipeline: CommandPipeline,
}

impl CommandEnv {
    pub fn new(
        ui: Arc<dyn Ui>,
        settings: Settings,
        events: EventBus,
        pipeline: CommandPipeline,
    ) -> Self {
        Self {
            ui,
            settings,
            events,
            pipeline,
        }
    }

    /// In-memory settings, a fresh bus and a pipeline reporting to `ui`.
    pub fn standalone(ui: Arc<dyn Ui>) -> Self {
        let events = EventBus::new();
        let reporter = Arc::new(ErrorReporter::new(ui.clone()));
        let pipeline = CommandPipeline::new(events.clone(), reporter);
        Self::new(ui, Settings::in_memory(), events, pipeline)
    }
}

/// Builds a command bound to a session's collaborators.
pub type CommandFactory = Arc<dyn Fn(&CommandEnv) -> Arc<dyn Command> + Send + Sync>;

pub fn command_factory<F, C>(build: F) -> CommandFactory
where
    F: Fn(&CommandEnv) -> C + Send + Sync + 'static,
    C: Command + 'static,
{
    Arc::new(move |env: &CommandEnv| Arc::new(build(env)) as Arc<dyn Command>)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Live name → handler bindings for one shell session.
#[derive(Default)]
pub struct CommandRouter {
    handlers: HashMap<String, Arc<dyn Command>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, handler: Arc<dyn Command>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn unbind(&mut self, name: &str) -> Option<Arc<dyn Command>> {
        self.handlers.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
