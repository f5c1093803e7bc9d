//! `shellforge-config`: the settings collaborator.
//!
//! Provides:
//! - Dotted-path `get` / `set` over a YAML document
//! - Defaults merged beneath the config file
//! - Atomic writes with a single backup
//! - Redacted snapshots for display

pub mod defaults;
pub mod io;
pub mod redact;
pub mod settings;

pub use defaults::{default_document, DEFAULT_LOG_LEVEL, DEFAULT_PROMPT};
pub use io::{config_dir, config_file_path};
pub use redact::redact;
pub use settings::Settings;
