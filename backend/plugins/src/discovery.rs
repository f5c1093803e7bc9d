/// Plugin discovery: scan the plugin root for manifests and resolve them
/// against the catalog.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shellforge_config::{defaults::PLUGINS_DIR_NAME, Settings};
use shellforge_core::PluginError;
use tracing::{debug, info, warn};

use crate::catalog::PluginCatalog;
use crate::manifest::{PluginManifest, MANIFEST_FILE};
use crate::sdk::PluginConstructor;

const README: &str = "\
# shellforge plugins

Each subdirectory holds one plugin and a plugin.json manifest:

    {
      \"name\": \"example\",
      \"version\": \"0.1.0\",
      \"description\": \"What it does\",
      \"entry\": \"example\",
      \"dependencies\": []
    }

`entry` names a plugin compiled into shellforge. Directories starting
with an underscore are ignored. `plugins init <entry>` writes a manifest.
";

/// A plugin that can be loaded.
#[derive(Clone)]
pub struct DiscoveredPlugin {
    pub manifest: PluginManifest,
    /// `None` for bundled plugins.
    pub dir: Option<PathBuf>,
    pub constructor: PluginConstructor,
}

#[derive(Clone)]
pub struct PluginDiscovery {
    root: PathBuf,
    catalog: PluginCatalog,
}

impl PluginDiscovery {
    pub fn new(root: impl Into<PathBuf>, catalog: PluginCatalog) -> Self {
        Self {
            root: root.into(),
            catalog,
        }
    }

    /// Root from the first `plugins.paths` entry, else `<config dir>/plugins`.
    pub fn from_settings(settings: &Settings, catalog: PluginCatalog) -> Self {
        let root = settings
            .get_or::<Vec<String>>("plugins.paths", Vec::new())
            .into_iter()
            .find(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| settings.config_dir().join(PLUGINS_DIR_NAME));
        Self::new(root, catalog)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Create the root with a README if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), PluginError> {
        if self.root.is_dir() {
            return Ok(());
        }
        let io_err = |source| PluginError::Io {
            path: self.root.clone(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        std::fs::write(self.root.join("README.md"), README).map_err(io_err)?;
        info!(root = %self.root.display(), "[Plugins] Created plugin directory");
        Ok(())
    }

    /// Everything loadable, keyed by manifest name. A directory manifest
    /// replaces a bundled plugin of the same name. Broken directories are
    /// logged and skipped.
    pub fn discover(&self) -> Result<BTreeMap<String, DiscoveredPlugin>, PluginError> {
        self.ensure_root()?;

        let mut found = BTreeMap::new();
        for (manifest, constructor) in self.catalog.bundled() {
            found.insert(
                manifest.name.clone(),
                DiscoveredPlugin {
                    manifest,
                    dir: None,
                    constructor,
                },
            );
        }

        let entries = std::fs::read_dir(&self.root).map_err(|source| PluginError::Io {
            path: self.root.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let dir = entry.path();
            let file_name = entry.file_name();
            let dir_name = file_name.to_string_lossy();
            if !dir.is_dir() || dir_name.starts_with('_') || dir_name.starts_with('.') {
                continue;
            }

            let manifest = match PluginManifest::load(&dir) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "[Plugins] Skipping plugin directory");
                    continue;
                }
            };
            let Some(constructor) = self.catalog.get(&manifest.entry) else {
                warn!(
                    plugin = %manifest.name,
                    entry = %manifest.entry,
                    "[Plugins] Unknown plugin entry; skipping"
                );
                continue;
            };

            debug!(plugin = %manifest.name, version = %manifest.version, "[Plugins] Discovered");
            found.insert(
                manifest.name.clone(),
                DiscoveredPlugin {
                    manifest,
                    dir: Some(dir),
                    constructor,
                },
            );
        }
        Ok(found)
    }

    /// Write `<root>/<entry>/plugin.json` for a catalog entry.
    pub fn scaffold(&self, entry: &str) -> Result<PathBuf, PluginError> {
        if !self.catalog.contains(entry) {
            return Err(PluginError::NotAvailable(entry.to_string()));
        }
        self.ensure_root()?;

        let dir = self.root.join(entry);
        let path = dir.join(MANIFEST_FILE);
        if path.exists() {
            return Err(PluginError::InvalidManifest {
                path,
                message: "manifest already exists".into(),
            });
        }

        let manifest = self
            .catalog
            .bundled()
            .into_iter()
            .map(|(m, _)| m)
            .find(|m| m.entry == entry)
            .unwrap_or_else(|| PluginManifest::new(entry, "0.1.0", entry));
        let body = serde_json::to_string_pretty(&manifest).map_err(|e| {
            PluginError::InvalidManifest {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        let io_err = |source| PluginError::Io {
            path: dir.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;
        std::fs::write(&path, body).map_err(io_err)?;
        info!(entry = %entry, path = %path.display(), "[Plugins] Scaffolded plugin manifest");
        Ok(path)
    }
}
