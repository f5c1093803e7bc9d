mod help_cmd;
mod plugins_cmd;
mod shell;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use shellforge_config::{Settings, DEFAULT_LOG_LEVEL};
use shellforge_core::Ui;
use shellforge_logging::init_logger;
use shellforge_plugins::PluginCatalog;

use shell::Shell;
use terminal::TerminalUi;

#[derive(Parser)]
#[command(name = "shellforge")]
#[command(about = "shellforge: an extensible interactive command shell")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.shellforge/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Plugin directory, overriding plugins.paths
    #[arg(long, value_name = "DIR")]
    plugins_dir: Option<PathBuf>,

    /// Verbose logging and error cause chains
    #[arg(long)]
    debug: bool,

    /// Where rolling log files go (default: <config dir>/logs)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Run a line and exit instead of reading stdin; repeatable
    #[arg(short = 'c', value_name = "LINE")]
    commands: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::new(cli.debug));

    let loaded = match &cli.config {
        Some(path) => Settings::load(path).await,
        None => Settings::load_default().await,
    };
    let (settings, load_error) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => {
            ui.warning(&format!("Could not read config ({e}); using defaults for this session"));
            (Settings::in_memory(), Some(e))
        }
    };

    let level = if cli.debug {
        "debug".to_string()
    } else {
        settings.get_or("system.log_level", DEFAULT_LOG_LEVEL.to_string())
    };
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| settings.config_dir().join("logs"));
    let _log_guard = init_logger(&log_dir, &level);
    if let Some(e) = load_error {
        warn!(error = %e, "[Shell] Config load failed");
    }
    info!(
        config = ?settings.path(),
        log_dir = %log_dir.display(),
        "Starting shellforge"
    );

    let mut catalog = PluginCatalog::new();
    shellforge_playground::register(&mut catalog);

    let mut shell = Shell::build(ui, settings, catalog, cli.plugins_dir, cli.debug).await?;
    shell.start().await;

    if cli.commands.is_empty() {
        shell.run_interactive().await?;
    } else {
        shell.run_lines(&cli.commands).await;
    }
    Ok(())
}
