pub mod catalog;
pub mod discovery;
pub mod lifecycle;
pub mod manifest;
pub mod registry;
pub mod sdk;

pub use catalog::PluginCatalog;
pub use discovery::{DiscoveredPlugin, PluginDiscovery};
pub use lifecycle::{LoadedPlugin, PluginInfo};
pub use manifest::{PluginManifest, MANIFEST_FILE};
pub use registry::PluginManager;
pub use sdk::{plugin_constructor, Plugin, PluginConstructor, PluginContext};
