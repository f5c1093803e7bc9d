/// Command registry: name → descriptor, live instance and category.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use shellforge_core::CommandError;
use tracing::{debug, warn};

use crate::category::CategoryValidator;
use crate::dispatch::Command;
use crate::types::{CommandSpec, CATEGORY_GENERAL};

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
    instances: HashMap<String, Arc<dyn Command>>,
    categories: BTreeMap<String, Vec<String>>,
    validator: CategoryValidator,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` under `category`.
    ///
    /// An unknown category is admitted when its name is well formed and
    /// otherwise replaced by `general`. Returns the category actually used.
    /// A duplicate name is rejected and leaves the registry untouched.
    pub fn register(
        &mut self,
        name: &str,
        spec: CommandSpec,
        category: &str,
        instance: Option<Arc<dyn Command>>,
    ) -> Result<String, CommandError> {
        if self.commands.contains_key(name) {
            return Err(CommandError::AlreadyRegistered(name.to_string()));
        }

        let category = if self.validator.is_valid_category(category) {
            category.to_string()
        } else {
            warn!(command = %name, category = %category, "[Commands] Non-standard category");
            if self.validator.add_category(category) {
                category.to_string()
            } else {
                CATEGORY_GENERAL.to_string()
            }
        };

        self.commands.insert(name.to_string(), spec);
        if let Some(instance) = instance {
            self.instances.insert(name.to_string(), instance);
        }
        self.categories
            .entry(category.clone())
            .or_default()
            .push(name.to_string());

        debug!(command = %name, category = %category, "[Commands] Registered");
        Ok(category)
    }

    /// Remove `name` everywhere. Unknown names are ignored.
    pub fn unregister(&mut self, name: &str) -> Option<CommandSpec> {
        self.instances.remove(name);
        for names in self.categories.values_mut() {
            names.retain(|n| n != name);
        }
        self.categories.retain(|_, names| !names.is_empty());
        self.commands.remove(name)
    }

    pub fn get_command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn get_command_instance(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.instances.get(name).cloned()
    }

    pub fn get_category_commands(&self, category: &str) -> Vec<String> {
        self.categories.get(category).cloned().unwrap_or_default()
    }

    /// Categories that currently hold at least one command.
    pub fn get_all_categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn add_category(&mut self, name: &str) -> bool {
        self.validator.add_category(name)
    }

    pub fn validator(&self) -> &CategoryValidator {
        &self.validator
    }

    pub fn category_of(&self, name: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(category, _)| category.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
