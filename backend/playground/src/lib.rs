//! Bundled demonstration plugin.

pub mod demo;
pub mod plugin;

pub use demo::PlaygroundCommand;
pub use plugin::{manifest, register, PlaygroundPlugin, PLUGIN_NAME};
