//! Default settings tree, merged beneath whatever the config file provides.

use std::path::Path;

use serde_json::{json, Value};

/// Default shell prompt.
pub const DEFAULT_PROMPT: &str = "shellforge> ";

/// Default log level when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Name of the plugin directory inside the config directory.
pub const PLUGINS_DIR_NAME: &str = "plugins";

/// Build the default document for a config rooted at `config_dir`.
pub fn default_document(config_dir: &Path) -> Value {
    let plugins_dir = config_dir.join(PLUGINS_DIR_NAME);
    json!({
        "system": {
            "debug": false,
            "log_level": DEFAULT_LOG_LEVEL,
            "command_timeout": null,
            "blocked_commands": [],
        },
        "ui": {
            "prompt": DEFAULT_PROMPT,
        },
        "plugins": {
            "enabled": [],
            "disabled": [],
            "auto_load": true,
            "paths": [plugins_dir.display().to_string()],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_plugins_into_config_dir() {
        let doc = default_document(Path::new("/home/u/.shellforge"));
        assert_eq!(doc["plugins"]["paths"][0], "/home/u/.shellforge/plugins");
        assert_eq!(doc["plugins"]["auto_load"], true);
        assert!(doc["system"]["command_timeout"].is_null());
        assert_eq!(doc["system"]["blocked_commands"], serde_json::json!([]));
        assert_eq!(doc["ui"]["prompt"], DEFAULT_PROMPT);
    }
}
