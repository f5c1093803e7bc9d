//! `help [command]`

use shellforge_commands::{CommandHost, CommandInput, CommandSource, CommandTable};
use shellforge_core::{CommandError, Ui};

pub const SUMMARY: &str = "List commands or show help for one";

/// Help text for commands the shell handles itself.
fn shell_help(name: &str) -> Option<String> {
    let text = match name {
        "help" => format!("{SUMMARY}\n\nUsage: help [command]"),
        "plugins" => format!("{}\n\n{}", crate::plugins_cmd::SUMMARY, crate::plugins_cmd::USAGE),
        "exit" | "quit" => "Unload all plugins and leave the shell\n\nUsage: exit".to_string(),
        _ => return None,
    };
    Some(text)
}

pub fn run(table: &CommandTable, ui: &dyn Ui, input: &CommandInput) -> Result<(), CommandError> {
    let Some(name) = input.subcommand() else {
        overview(table, ui);
        return Ok(());
    };

    if let Some(command) = table.get_command(name) {
        ui.info(&command.help());
        return Ok(());
    }
    match shell_help(name) {
        Some(text) if table.is_registered(name) => {
            ui.info(&text);
            Ok(())
        }
        _ => Err(CommandError::NotFound(name.to_string())),
    }
}

fn overview(table: &CommandTable, ui: &dyn Ui) {
    let rows: Vec<Vec<String>> = table
        .listing()
        .into_iter()
        .map(|entry| {
            let source = match &entry.spec.source {
                CommandSource::Builtin => "builtin".to_string(),
                CommandSource::Plugin(plugin) => plugin.clone(),
            };
            vec![entry.category, entry.spec.name, entry.spec.summary, source]
        })
        .collect();
    ui.table("Commands", &["Category", "Command", "Description", "Source"], &rows);
    ui.info("Type 'help <command>' or '<command> --help' for details.");
}
