/// Compiled-in plugin constructors, keyed by manifest `entry`.
use std::collections::BTreeMap;

use crate::manifest::PluginManifest;
use crate::sdk::PluginConstructor;

#[derive(Clone)]
struct CatalogEntry {
    constructor: PluginConstructor,
    /// Bundled entries are available without a plugin directory.
    bundled: Option<PluginManifest>,
}

#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `entry` resolvable from plugin manifests.
    pub fn register(&mut self, entry: impl Into<String>, constructor: PluginConstructor) {
        self.entries.insert(
            entry.into(),
            CatalogEntry {
                constructor,
                bundled: None,
            },
        );
    }

    /// Register an entry that is discoverable without a manifest on disk.
    pub fn bundle(&mut self, manifest: PluginManifest, constructor: PluginConstructor) {
        self.entries.insert(
            manifest.entry.clone(),
            CatalogEntry {
                constructor,
                bundled: Some(manifest),
            },
        );
    }

    pub fn get(&self, entry: &str) -> Option<PluginConstructor> {
        self.entries.get(entry).map(|e| e.constructor.clone())
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Manifests of bundled entries with their constructors.
    pub fn bundled(&self) -> Vec<(PluginManifest, PluginConstructor)> {
        self.entries
            .values()
            .filter_map(|e| e.bundled.clone().map(|m| (m, e.constructor.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{plugin_constructor, Plugin};

    struct Nop;

    #[async_trait::async_trait]
    impl Plugin for Nop {
        fn name(&self) -> &str {
            "nop"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }
    }

    #[test]
    fn test_register_and_bundle() {
        let mut catalog = PluginCatalog::new();
        catalog.register("nop", plugin_constructor(|_| Nop));
        catalog.bundle(
            PluginManifest::new("builtin-nop", "0.1.0", "builtin-nop"),
            plugin_constructor(|_| Nop),
        );
        assert!(catalog.contains("nop"));
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.entries(), vec!["builtin-nop", "nop"]);
        let bundled = catalog.bundled();
        assert_eq!(bundled.len(), 1);
        assert_eq!(bundled[0].0.name, "builtin-nop");
    }
}
