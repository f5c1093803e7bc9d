//! `plugins` built-in
//!
//! Drives the plugin manager from the prompt. Manager failures are reported
//! by the manager itself, so only usage errors come back from here.

use shellforge_commands::CommandInput;
use shellforge_core::{CommandError, Ui};
use shellforge_plugins::PluginManager;

pub const SUMMARY: &str = "List, load, unload and reload plugins";

pub const USAGE: &str = "\
plugins [list]            Loaded plugins in load order
plugins available         Discovered plugins and whether they are loaded
plugins info <name>       Details of a loaded plugin
plugins load <name>       Load a discovered plugin
plugins unload <name>     Unload a plugin and remove its commands
plugins reload <name>     Unload then load a plugin
plugins init <entry>      Write a manifest for a compiled-in plugin";

pub async fn run(
    manager: &mut PluginManager,
    ui: &dyn Ui,
    input: &CommandInput,
) -> Result<(), CommandError> {
    let sub = input.subcommand().unwrap_or("list");
    let target = input.args.get(1).map(String::as_str);
    let need = |what: &str| {
        target.ok_or_else(|| CommandError::InvalidInput(format!("usage: plugins {sub} <{what}>")))
    };

    match sub {
        "list" => list(manager, ui),
        "available" => available(manager, ui),
        "info" => info(manager, ui, need("name")?),
        "load" => {
            if let Ok(name) = manager.load_by_name(need("name")?).await {
                ui.success(&format!("Loaded plugin {name}"));
            }
        }
        "unload" => {
            let name = need("name")?;
            if manager.unload_plugin(name).await.is_ok() {
                ui.success(&format!("Unloaded plugin {name}"));
            }
        }
        "reload" => {
            if let Ok(name) = manager.reload_plugin(need("name")?).await {
                ui.success(&format!("Reloaded plugin {name}"));
            }
        }
        "init" => {
            if let Ok(path) = manager.scaffold(need("entry")?) {
                ui.success(&format!("Wrote {}", path.display()));
            }
        }
        other => {
            return Err(CommandError::InvalidInput(format!(
                "unknown plugins subcommand '{other}'"
            )))
        }
    }
    Ok(())
}

fn list(manager: &PluginManager, ui: &dyn Ui) {
    let rows: Vec<Vec<String>> = manager
        .plugins()
        .into_iter()
        .map(|p| {
            vec![
                p.name,
                p.version,
                p.commands.join(", "),
                p.initialized_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    ui.table("Loaded plugins", &["Name", "Version", "Commands", "Loaded at"], &rows);
}

fn available(manager: &mut PluginManager, ui: &dyn Ui) {
    if manager.discover().is_err() {
        return;
    }
    let rows: Vec<Vec<String>> = manager
        .available_plugins()
        .into_iter()
        .map(|(name, version)| {
            let state = if manager.is_loaded(&name) { "loaded" } else { "available" };
            vec![name, version, state.to_string()]
        })
        .collect();
    ui.table("Available plugins", &["Name", "Version", "State"], &rows);
}

fn info(manager: &PluginManager, ui: &dyn Ui, name: &str) {
    let Some(p) = manager.plugin(name) else {
        ui.warning(&format!("Plugin {name} is not loaded"));
        return;
    };
    let none = |v: &[String]| if v.is_empty() { "-".to_string() } else { v.join(", ") };
    let rows = vec![
        vec!["Name".to_string(), p.name.clone()],
        vec!["Version".to_string(), p.version.clone()],
        vec!["Description".to_string(), p.description.clone()],
        vec!["Dependencies".to_string(), none(&p.dependencies)],
        vec!["Commands".to_string(), none(&p.commands)],
        vec!["Loaded at".to_string(), p.initialized_at.to_rfc3339()],
    ];
    ui.table(&format!("Plugin {name}"), &["Property", "Value"], &rows);
}
