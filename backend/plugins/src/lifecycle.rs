//! Bookkeeping for loaded plugins and the bind/unbind steps of the
//! load and unload sequences.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shellforge_commands::CommandHost;
use shellforge_core::{EventBus, EventHandler, PluginError};
use tracing::{debug, warn};

use crate::sdk::{Plugin, PluginConstructor};

/// A plugin in the loaded set.
pub struct LoadedPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub constructor: PluginConstructor,
    pub initialized_at: DateTime<Utc>,
    pub commands: Vec<String>,
    pub hooks: Vec<(String, Arc<dyn EventHandler>)>,
}

impl LoadedPlugin {
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.plugin.name().to_string(),
            version: self.plugin.version().to_string(),
            description: self.plugin.description().to_string(),
            dependencies: self.plugin.dependencies(),
            commands: self.commands.clone(),
            initialized_at: self.initialized_at,
        }
    }
}

/// Read-only view of a loaded plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub commands: Vec<String>,
    pub initialized_at: DateTime<Utc>,
}

/// Register every command the plugin provides. On a failure the commands
/// registered so far are removed again.
pub fn bind_commands(
    plugin: &dyn Plugin,
    host: &dyn CommandHost,
) -> Result<Vec<String>, PluginError> {
    let name = plugin.name();
    let mut bound: Vec<String> = Vec::new();
    for (command, factory) in plugin.commands() {
        if let Err(source) = host.register_plugin_command(name, &command, &factory) {
            for done in &bound {
                host.unregister_command(done);
            }
            return Err(PluginError::CommandRegistration {
                plugin: name.to_string(),
                command,
                source,
            });
        }
        bound.push(command);
    }
    debug!(plugin = %name, commands = ?bound, "[Plugins] Commands bound");
    Ok(bound)
}

pub fn unbind_commands(plugin: &str, commands: &[String], host: &dyn CommandHost) {
    for command in commands {
        if !host.unregister_command(command) {
            warn!(plugin = %plugin, command = %command, "[Plugins] Command was already gone");
        }
    }
}

/// Subscribe the plugin's event hooks and return them for later removal.
pub fn bind_hooks(plugin: &dyn Plugin, events: &EventBus) -> Vec<(String, Arc<dyn EventHandler>)> {
    let hooks = plugin.hooks();
    for (event, handler) in &hooks {
        events.subscribe(event.clone(), handler.clone());
    }
    hooks
}

pub fn unbind_hooks(plugin: &str, hooks: &[(String, Arc<dyn EventHandler>)], events: &EventBus) {
    for (event, handler) in hooks {
        if let Err(e) = events.unsubscribe(event, handler) {
            warn!(plugin = %plugin, event = %event, error = %e, "[Plugins] Hook was not subscribed");
        }
    }
}
