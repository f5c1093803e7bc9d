//! Plugin SDK
//!
//! The capability every plugin implements and the context it is built with.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shellforge_commands::CommandFactory;
use shellforge_config::Settings;
use shellforge_core::{Event, EventBus, EventHandler, Ui};
use tracing::warn;
use uuid::Uuid;

/// Collaborators handed to a plugin when it is constructed.
#[derive(Clone)]
pub struct PluginContext {
    pub ui: Arc<dyn Ui>,
    pub settings: Settings,
    pub events: EventBus,
}

impl PluginContext {
    pub fn new(ui: Arc<dyn Ui>, settings: Settings, events: EventBus) -> Self {
        Self {
            ui,
            settings,
            events,
        }
    }

    /// Emit `<plugin>.<name>` with the plugin as source. Handler failures
    /// are logged, not raised.
    pub fn emit(&self, plugin: &str, name: &str, payload: Value) {
        let event = Event::new(format!("{}.{}", plugin, name), payload).with_source(plugin);
        if let Err(e) = self.events.emit(event) {
            warn!(plugin = %plugin, event = %name, error = %e, "[Plugins] Event emission failed");
        }
    }

    /// Like [`emit`](Self::emit), correlated with an operation.
    pub fn emit_in(&self, plugin: &str, name: &str, payload: Value, operation: Uuid) {
        let event = Event::new(format!("{}.{}", plugin, name), payload)
            .with_source(plugin)
            .with_operation(operation);
        if let Err(e) = self.events.emit(event) {
            warn!(plugin = %plugin, event = %name, error = %e, "[Plugins] Event emission failed");
        }
    }
}

/// A loadable extension: metadata, two lifecycle hooks, and the commands
/// and event handlers it contributes.
///
/// The manager owns sequencing. `initialize` runs before any command is
/// registered; `cleanup` runs after they are removed.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Plugins that must already be loaded.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn initialize(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cleanup(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn commands(&self) -> Vec<(String, CommandFactory)> {
        Vec::new()
    }

    /// `(event name, handler)` pairs subscribed while the plugin is loaded.
    fn hooks(&self) -> Vec<(String, Arc<dyn EventHandler>)> {
        Vec::new()
    }
}

/// Builds a plugin instance from its context.
pub type PluginConstructor = Arc<dyn Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync>;

pub fn plugin_constructor<F, P>(build: F) -> PluginConstructor
where
    F: Fn(&PluginContext) -> P + Send + Sync + 'static,
    P: Plugin + 'static,
{
    Arc::new(move |ctx: &PluginContext| Arc::new(build(ctx)) as Arc<dyn Plugin>)
}
