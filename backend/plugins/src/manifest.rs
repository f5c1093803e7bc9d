/// Plugin manifest: the `plugin.json` descriptor in each plugin directory.
use std::path::Path;

use serde::{Deserialize, Serialize};
use shellforge_core::PluginError;

pub const MANIFEST_FILE: &str = "plugin.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Catalog entry that constructs the plugin.
    pub entry: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            entry: entry.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Read and validate `<dir>/plugin.json`.
    pub fn load(dir: &Path) -> Result<Self, PluginError> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|source| PluginError::Io {
            path: path.clone(),
            source,
        })?;
        let manifest: Self =
            serde_json::from_str(&raw).map_err(|e| PluginError::InvalidManifest {
                path: path.clone(),
                message: e.to_string(),
            })?;
        manifest.validate().map_err(|message| PluginError::InvalidManifest {
            path,
            message,
        })?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("missing 'name'".into());
        }
        if self.version.trim().is_empty() {
            return Err("missing 'version'".into());
        }
        if self.entry.trim().is_empty() {
            return Err("missing 'entry'".into());
        }
        if self.dependencies.iter().any(|d| d == &self.name) {
            return Err(format!("'{}' depends on itself", self.name));
        }
        Ok(())
    }
}
