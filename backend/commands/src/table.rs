/// The shell's live command table: registry plus router, behind the
/// registration contract plugins use.
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shellforge_core::CommandError;
use tracing::{debug, info};

use crate::dispatch::{Command, CommandEnv, CommandFactory, CommandRouter};
use crate::registry::CommandRegistry;
use crate::types::{CommandInput, CommandSpec, CATEGORY_PLUGIN};

// ---------------------------------------------------------------------------
// Host contract
// ---------------------------------------------------------------------------

/// What the plugin manager may do to the shell's commands.
pub trait CommandHost: Send + Sync {
    /// Build the command from `factory` and bind it under `name`.
    fn register_plugin_command(
        &self,
        plugin: &str,
        name: &str,
        factory: &CommandFactory,
    ) -> Result<(), CommandError>;

    fn get_command(&self, name: &str) -> Option<Arc<dyn Command>>;

    /// Returns whether anything was removed.
    fn unregister_command(&self, name: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One row of [`CommandTable::listing`].
#[derive(Debug, Clone)]
pub struct CommandListing {
    pub spec: CommandSpec,
    pub category: String,
}

pub struct CommandTable {
    env: CommandEnv,
    registry: RwLock<CommandRegistry>,
    router: RwLock<CommandRouter>,
}

impl CommandTable {
    pub fn new(env: CommandEnv) -> Self {
        Self {
            env,
            registry: RwLock::new(CommandRegistry::new()),
            router: RwLock::new(CommandRouter::new()),
        }
    }

    pub fn env(&self) -> &CommandEnv {
        &self.env
    }

    fn registry(&self) -> RwLockReadGuard<'_, CommandRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, CommandRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn router(&self) -> RwLockReadGuard<'_, CommandRouter> {
        self.router.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn router_mut(&self) -> RwLockWriteGuard<'_, CommandRouter> {
        self.router.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register and bind a built-in command.
    pub fn register(&self, command: Arc<dyn Command>, category: &str) -> Result<String, CommandError> {
        let name = command.name().to_string();
        let spec = CommandSpec::builtin(&name, command.summary());
        let category = self
            .registry_mut()
            .register(&name, spec, category, Some(command.clone()))?;
        self.router_mut().bind(name, command);
        Ok(category)
    }

    /// Record a command the shell front-end handles itself. It is listed
    /// and reserved, but has no handler in the table.
    pub fn reserve(&self, spec: CommandSpec, category: &str) -> Result<String, CommandError> {
        let name = spec.name.clone();
        self.registry_mut().register(&name, spec, category, None)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry().get_command(name).is_some()
    }

    pub fn spec(&self, name: &str) -> Option<CommandSpec> {
        self.registry().get_command(name).cloned()
    }

    pub fn category_commands(&self, category: &str) -> Vec<String> {
        self.registry().get_category_commands(category)
    }

    pub fn categories(&self) -> Vec<String> {
        self.registry().get_all_categories()
    }

    pub fn add_category(&self, name: &str) -> bool {
        self.registry_mut().add_category(name)
    }

    /// Every registered command grouped by category, sorted by name.
    pub fn listing(&self) -> Vec<CommandListing> {
        let registry = self.registry();
        let mut rows = Vec::new();
        for category in registry.get_all_categories() {
            let mut names = registry.get_category_commands(&category);
            names.sort();
            for name in names {
                if let Some(spec) = registry.get_command(&name) {
                    rows.push(CommandListing {
                        spec: spec.clone(),
                        category: category.clone(),
                    });
                }
            }
        }
        rows
    }

    /// Run the command named by `input`. `--help` prints the command's
    /// help instead of running it.
    pub async fn dispatch(&self, input: &CommandInput) -> Result<(), CommandError> {
        let command = self
            .get_command(&input.name)
            .ok_or_else(|| CommandError::NotFound(input.name.clone()))?;

        if input.flag("help") {
            self.env.ui.info(&command.help());
            return Ok(());
        }

        debug!(command = %input.name, args = ?input.args, "[Commands] Dispatching");
        command.run(input).await.map_err(|e| CommandError::Failed {
            command: input.name.clone(),
            args: input.args.clone(),
            message: format!("{:#}", e),
            exit_code: None,
        })
    }
}

impl CommandHost for CommandTable {
    fn register_plugin_command(
        &self,
        plugin: &str,
        name: &str,
        factory: &CommandFactory,
    ) -> Result<(), CommandError> {
        let command = factory(&self.env);
        let spec = CommandSpec::plugin(name, command.summary(), plugin);
        self.registry_mut()
            .register(name, spec, CATEGORY_PLUGIN, Some(command.clone()))?;
        self.router_mut().bind(name, command);
        info!(plugin = %plugin, command = %name, "[Commands] Plugin command registered");
        Ok(())
    }

    fn get_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.router().get(name)
    }

    fn unregister_command(&self, name: &str) -> bool {
        let bound = self.router_mut().unbind(name).is_some();
        let registered = self.registry_mut().unregister(name).is_some();
        if bound || registered {
            debug!(command = %name, "[Commands] Unregistered");
        }
        bound || registered
    }
}
