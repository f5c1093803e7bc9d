//! The `Settings` collaborator: dotted-path access over a shared document.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shellforge_core::ConfigError;
use tracing::debug;

use crate::defaults::default_document;
use crate::io::{config_dir, config_file_path, deep_merge, read_document, write_document};

/// Cloneable handle; clones observe each other's writes.
#[derive(Clone)]
pub struct Settings {
    doc: Arc<RwLock<Value>>,
    path: Option<Arc<PathBuf>>,
}

impl Settings {
    /// Defaults only, never persisted.
    pub fn in_memory() -> Self {
        Self {
            doc: Arc::new(RwLock::new(default_document(&config_dir()))),
            path: None,
        }
    }

    /// Defaults for a config file at `path` without touching the disk.
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = default_document(&parent_dir(&path));
        Self {
            doc: Arc::new(RwLock::new(doc)),
            path: Some(Arc::new(path)),
        }
    }

    /// Load `<config_dir>/config.yaml`, or the defaults when it is absent.
    pub async fn load_default() -> Result<Self, ConfigError> {
        Self::load(config_file_path(&config_dir())).await
    }

    /// Load the file at `path` merged over the defaults.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let settings = Self::with_defaults(path);
        if let Some(path) = settings.path() {
            if let Some(file_doc) = read_document(path).await? {
                deep_merge(&mut settings.write(), &file_doc);
            }
        }
        Ok(settings)
    }

    /// Persist the current document. No-op for in-memory settings.
    pub async fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = self.path() else {
            debug!("In-memory settings; nothing to save");
            return Ok(());
        };
        let snapshot = self.snapshot();
        write_document(&snapshot, path).await
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    /// Directory holding the config file.
    pub fn config_dir(&self) -> PathBuf {
        match self.path() {
            Some(path) => parent_dir(path),
            None => config_dir(),
        }
    }

    pub fn snapshot(&self) -> Value {
        self.read().clone()
    }

    /// Value at a dotted path such as `plugins.auto_load`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let doc = self.read();
        lookup(&doc, path).cloned()
    }

    /// Typed lookup; falls back to `default` when the path is missing, null,
    /// or holds a value of another shape.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        match self.get(path) {
            Some(Value::Null) | None => default,
            Some(value) => serde_json::from_value(value).unwrap_or(default),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        lookup(&self.read(), path).is_some()
    }

    /// Store `value` at `path`, creating intermediate mappings.
    pub fn set(&self, path: &str, value: impl Serialize) -> Result<(), ConfigError> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
            key: path.to_string(),
            message: e.to_string(),
        })?;
        let segments = split_path(path)?;

        let mut doc = self.write();
        let mut node: &mut Value = &mut doc;
        for (depth, segment) in segments.iter().enumerate() {
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return Err(ConfigError::InvalidValue {
                    key: path.to_string(),
                    message: format!("'{}' is not a mapping", segments[..depth].join(".")),
                });
            };
            if depth + 1 == segments.len() {
                map.insert((*segment).to_string(), value);
                debug!(setting = path, "Setting updated");
                return Ok(());
            }
            node = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        Ok(())
    }

    /// Remove the value at `path`. Returns the removed value.
    pub fn remove(&self, path: &str) -> Option<Value> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut doc = self.write();
        let mut node: &mut Value = &mut doc;
        for segment in parents {
            node = node.as_object_mut()?.get_mut(*segment)?;
        }
        node.as_object_mut()?.remove(*last)
    }

    fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.doc.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.doc.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn split_path(path: &str) -> Result<Vec<&str>, ConfigError> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::InvalidValue {
            key: path.to_string(),
            message: "setting path must be non-empty dotted segments".into(),
        });
    }
    Ok(segments)
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(doc, |node, segment| node.as_object()?.get(segment))
}
