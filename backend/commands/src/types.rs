/// Command types.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

pub const CATEGORY_GENERAL: &str = "general";
pub const CATEGORY_SYSTEM: &str = "system";
pub const CATEGORY_PLUGIN: &str = "plugin";

// ---------------------------------------------------------------------------
// Command descriptor
// ---------------------------------------------------------------------------

/// Where a registered command came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum CommandSource {
    Builtin,
    Plugin(String),
}

/// Static description of a registered command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub summary: String,
    pub source: CommandSource,
}

impl CommandSpec {
    pub fn builtin(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            source: CommandSource::Builtin,
        }
    }

    pub fn plugin(
        name: impl Into<String>,
        summary: impl Into<String>,
        plugin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            source: CommandSource::Plugin(plugin.into()),
        }
    }

    pub fn plugin_name(&self) -> Option<&str> {
        match &self.source {
            CommandSource::Plugin(name) => Some(name),
            CommandSource::Builtin => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed input
// ---------------------------------------------------------------------------

/// A parsed input line, handed to the command bound to `name`.
#[derive(Debug, Clone)]
pub struct CommandInput {
    pub name: String,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Boolean flags (`--flag`, `-abc`).
    pub flags: BTreeSet<String>,
    /// Key/value options (`--key value`, `--key=value`, `-k=value`).
    pub options: Map<String, Value>,
    pub raw: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl CommandInput {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            flags: BTreeSet::new(),
            options: Map::new(),
            raw: String::new(),
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Option rendered as text. Strings come back unquoted.
    pub fn option_str(&self, name: &str) -> Option<String> {
        self.option(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn option_f64(&self, name: &str) -> Option<f64> {
        match self.option(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// First positional argument, typically a subcommand.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Input with the first positional argument removed.
    pub fn shift(&self) -> Self {
        let mut next = self.clone();
        if !next.args.is_empty() {
            next.args.remove(0);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_accessors() {
        let mut input = CommandInput::new("run", vec!["sleep".into(), "5".into()]);
        input.options.insert("timeout".into(), json!(1.5));
        input.options.insert("cwd".into(), json!("/tmp"));
        input.options.insert("retries".into(), json!("3"));
        input.flags.insert("verbose".into());

        assert_eq!(input.option_f64("timeout"), Some(1.5));
        assert_eq!(input.option_f64("retries"), Some(3.0));
        assert_eq!(input.option_str("cwd").as_deref(), Some("/tmp"));
        assert!(input.flag("verbose"));
        assert_eq!(input.subcommand(), Some("sleep"));
        assert_eq!(input.shift().args, vec!["5"]);
    }

    #[test]
    fn test_spec_source() {
        let spec = CommandSpec::plugin("playground", "demo", "playground");
        assert_eq!(spec.plugin_name(), Some("playground"));
        assert!(CommandSpec::builtin("help", "").plugin_name().is_none());
    }
}
