//! Settings file read/write with a single backup.

use std::path::{Path, PathBuf};

use serde_json::Value;
use shellforge_core::ConfigError;
use tokio::fs;
use tracing::{debug, info, warn};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the shellforge config directory.
/// Priority: `SHELLFORGE_CONFIG_DIR` env > `~/.shellforge/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SHELLFORGE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".shellforge"),
        None => PathBuf::from(".shellforge"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the YAML document at `path`.
///
/// Returns `Ok(None)` if the file doesn't exist (first run). An empty file
/// reads as an empty mapping.
pub async fn read_document(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if raw.trim().is_empty() {
        return Ok(Some(Value::Object(Default::default())));
    }

    let doc: Value = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if !doc.is_object() {
        return Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top-level document must be a mapping".into(),
        });
    }

    info!(path = %path.display(), "Loaded config");
    Ok(Some(doc))
}

/// Write `doc` to disk atomically (write to temp file, rename).
///
/// The previous file, if any, is kept as `<name>.bak`.
pub async fn write_document(doc: &Value, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    if path.exists() {
        let bak = backup_path(path);
        if let Err(e) = fs::copy(path, &bak).await {
            warn!("Failed to create backup {}: {}", bak.display(), e);
        }
    }

    let yaml = serde_yaml::to_string(doc).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let tmp_path = sibling_with_suffix(path, "tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .map_err(write_err)?;
    fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.into());
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Recursively overlay `patch` onto `base`. Mappings merge key by key; any
/// other value in `patch` replaces the one in `base`.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_val),
                    None => {
                        base_map.insert(key.clone(), patch_val.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_overlays_nested_keys() {
        let mut base = json!({ "system": { "debug": false, "log_level": "info" }, "ui": {} });
        deep_merge(&mut base, &json!({ "system": { "debug": true }, "extra": [1] }));
        assert_eq!(base["system"]["debug"], true);
        assert_eq!(base["system"]["log_level"], "info");
        assert_eq!(base["extra"], json!([1]));
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/tmp/x/config.yaml")),
            PathBuf::from("/tmp/x/config.yaml.bak")
        );
    }

    #[tokio::test]
    async fn test_write_then_read_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        write_document(&json!({ "a": 1 }), &path).await.unwrap();
        write_document(&json!({ "a": 2 }), &path).await.unwrap();

        let doc = read_document(&path).await.unwrap().unwrap();
        assert_eq!(doc["a"], 2);
        let bak = std::fs::read_to_string(backup_path(&path)).unwrap();
        assert!(bak.contains("a: 1"));
    }

    #[tokio::test]
    async fn test_read_rejects_non_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(matches!(
            read_document(&path).await,
            Err(ConfigError::Parse { .. })
        ));
        assert!(read_document(&dir.path().join("missing.yaml"))
            .await
            .unwrap()
            .is_none());
    }
}
