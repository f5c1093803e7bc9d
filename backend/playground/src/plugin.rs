//! The playground plugin: one `playground` command and a test-event hook.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shellforge_commands::{command_factory, CommandEnv, CommandFactory};
use shellforge_core::{from_fn, Event, EventHandler};
use shellforge_plugins::{plugin_constructor, Plugin, PluginCatalog, PluginContext, PluginManifest};
use tracing::debug;

use crate::demo::PlaygroundCommand;

pub const PLUGIN_NAME: &str = "playground";
pub const PLUGIN_VERSION: &str = "1.0.0";
pub const TEST_EVENT: &str = "playground.test";

pub struct PlaygroundPlugin;

impl PlaygroundPlugin {
    pub fn new(_ctx: &PluginContext) -> Self {
        Self
    }
}

/// Manifest used when the playground is bundled into the binary.
pub fn manifest() -> PluginManifest {
    PluginManifest::new(PLUGIN_NAME, PLUGIN_VERSION, PLUGIN_NAME)
        .with_description("Demonstrates events, operations, the command pipeline and settings")
}

/// Add the playground to `catalog` as a bundled plugin.
pub fn register(catalog: &mut PluginCatalog) {
    catalog.bundle(manifest(), plugin_constructor(PlaygroundPlugin::new));
}

#[async_trait]
impl Plugin for PlaygroundPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        PLUGIN_VERSION
    }

    fn description(&self) -> &str {
        "Demonstrates events, operations, the command pipeline and settings"
    }

    async fn initialize(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        let settings = &ctx.settings;
        if !settings.get_or("playground.initialized", false) {
            debug!("[Playground] First run; writing defaults");
            settings.set("playground.initialized", true)?;
            settings.set("playground.last_run", "Never")?;
            settings.set("playground.runs", 0)?;
        }
        Ok(())
    }

    async fn cleanup(&self, ctx: &PluginContext) -> anyhow::Result<()> {
        ctx.settings
            .set("playground.last_run", Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn commands(&self) -> Vec<(String, CommandFactory)> {
        vec![(
            "playground".to_string(),
            command_factory(|env: &CommandEnv| PlaygroundCommand::new(env.clone())),
        )]
    }

    fn hooks(&self) -> Vec<(String, Arc<dyn EventHandler>)> {
        let handler = from_fn("playground-test-hook", |event: &Event| {
            debug!(event = %event.name, payload = %event.payload, "[Playground] Test event");
            Ok(())
        });
        vec![(TEST_EVENT.to_string(), handler)]
    }
}
