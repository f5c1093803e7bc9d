/// Plugin manager: owns the loaded-plugin set and runs every load,
/// unload and reload through the shell's command host.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};
use shellforge_commands::CommandHost;
use shellforge_core::{names, ErrorReporter, Event, PluginError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{DiscoveredPlugin, PluginDiscovery};
use crate::lifecycle::{
    bind_commands, bind_hooks, unbind_commands, unbind_hooks, LoadedPlugin, PluginInfo,
};
use crate::manifest::MANIFEST_FILE;
use crate::sdk::{Plugin, PluginConstructor, PluginContext};

const EVENT_SOURCE: &str = "plugins";

pub struct PluginManager {
    ctx: PluginContext,
    host: Arc<dyn CommandHost>,
    reporter: Arc<ErrorReporter>,
    discovery: PluginDiscovery,
    loaded: HashMap<String, LoadedPlugin>,
    load_order: Vec<String>,
    available: BTreeMap<String, DiscoveredPlugin>,
}

impl PluginManager {
    pub fn new(
        ctx: PluginContext,
        host: Arc<dyn CommandHost>,
        reporter: Arc<ErrorReporter>,
        discovery: PluginDiscovery,
    ) -> Self {
        Self {
            ctx,
            host,
            reporter,
            discovery,
            loaded: HashMap::new(),
            load_order: Vec::new(),
            available: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &PluginContext {
        &self.ctx
    }

    pub fn discovery(&self) -> &PluginDiscovery {
        &self.discovery
    }

    fn report(&self, err: PluginError, operation: &str) -> PluginError {
        self.reporter.report_plugin(err, operation)
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Rescan the plugin root. Returns how many plugins are available.
    pub fn discover(&mut self) -> Result<usize, PluginError> {
        match self.discovery.discover() {
            Ok(found) => {
                info!(count = found.len(), root = %self.discovery.root().display(), "[Plugins] Discovery finished");
                self.available = found;
                Ok(self.available.len())
            }
            Err(e) => Err(self.report(e, "discover")),
        }
    }

    /// Discovered plugin name → manifest version.
    pub fn available_plugins(&self) -> BTreeMap<String, String> {
        self.available
            .iter()
            .map(|(name, found)| (name.clone(), found.manifest.version.clone()))
            .collect()
    }

    pub fn scaffold(&self, entry: &str) -> Result<PathBuf, PluginError> {
        self.discovery
            .scaffold(entry)
            .map_err(|e| self.report(e, "scaffold"))
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Construct, check, initialize and bind a plugin. Runs inside a
    /// `plugin.load` operation on the event bus.
    pub async fn load_plugin(&mut self, constructor: &PluginConstructor) -> Result<String, PluginError> {
        let plugin = constructor(&self.ctx);
        self.load_constructed(plugin, constructor).await
    }

    /// Load a discovered plugin. The instance must carry the manifest name
    /// it was discovered under.
    async fn load_discovered(&mut self, name: &str) -> Result<String, PluginError> {
        let Some(found) = self.available.get(name) else {
            return Err(self.report(PluginError::NotAvailable(name.to_string()), "load_plugin"));
        };
        let constructor = found.constructor.clone();
        let manifest_path = found
            .dir
            .as_ref()
            .map(|dir| dir.join(MANIFEST_FILE))
            .unwrap_or_else(|| PathBuf::from(name));

        let plugin = constructor(&self.ctx);
        if plugin.name() != name {
            let err = PluginError::InvalidManifest {
                path: manifest_path,
                message: format!(
                    "manifest name {} does not match plugin name {}",
                    name,
                    plugin.name()
                ),
            };
            return Err(self.report(err, "load_plugin"));
        }
        self.load_constructed(plugin, &constructor).await
    }

    async fn load_constructed(
        &mut self,
        plugin: Arc<dyn Plugin>,
        constructor: &PluginConstructor,
    ) -> Result<String, PluginError> {
        let name = plugin.name().to_string();

        let mut metadata = Map::new();
        metadata.insert("plugin".into(), json!(name));
        metadata.insert("version".into(), json!(plugin.version()));
        let events = self.ctx.events.clone();
        let op = events.start_operation("plugin.load", metadata);

        let outcome = self.load_instance(plugin, constructor.clone(), op).await;
        let (status, error) = match &outcome {
            Ok(()) => ("completed", None),
            Err(e) => ("failed", Some(e.to_string())),
        };
        if let Err(e) = events.complete_operation(op, status, error) {
            warn!(operation_id = %op, error = %e, "[Plugins] Could not complete load operation");
        }

        match outcome {
            Ok(()) => Ok(name),
            Err(e) => Err(self.report(e, "load_plugin")),
        }
    }

    async fn load_instance(
        &mut self,
        plugin: Arc<dyn Plugin>,
        constructor: PluginConstructor,
        op: Uuid,
    ) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        if name.trim().is_empty() {
            return Err(PluginError::EmptyName);
        }
        if self.loaded.contains_key(&name) {
            return Err(PluginError::AlreadyLoaded(name));
        }
        let missing: Vec<String> = plugin
            .dependencies()
            .into_iter()
            .filter(|dep| !self.loaded.contains_key(dep))
            .collect();
        if !missing.is_empty() {
            return Err(PluginError::MissingDependencies {
                plugin: name,
                missing,
            });
        }

        debug!(plugin = %name, "[Plugins] Initializing");
        plugin
            .initialize(&self.ctx)
            .await
            .map_err(|e| PluginError::InitializeFailed {
                plugin: name.clone(),
                source: e.into(),
            })?;

        let commands = match bind_commands(plugin.as_ref(), self.host.as_ref()) {
            Ok(commands) => commands,
            Err(e) => {
                if let Err(cleanup) = plugin.cleanup(&self.ctx).await {
                    warn!(plugin = %name, error = %cleanup, "[Plugins] Cleanup after failed load failed");
                }
                return Err(e);
            }
        };
        let hooks = bind_hooks(plugin.as_ref(), &self.ctx.events);

        let version = plugin.version().to_string();
        self.loaded.insert(
            name.clone(),
            LoadedPlugin {
                plugin,
                constructor,
                initialized_at: Utc::now(),
                commands,
                hooks,
            },
        );
        self.load_order.push(name.clone());
        info!(plugin = %name, version = %version, "[Plugins] Loaded");

        self.ctx.events.emit(
            Event::new(
                names::PLUGIN_LOADED,
                json!({ "plugin_name": name, "version": version }),
            )
            .with_operation(op)
            .with_source(EVENT_SOURCE),
        )?;
        Ok(())
    }

    /// Load a discovered plugin by manifest name, rescanning once if it is
    /// not known yet.
    pub async fn load_by_name(&mut self, name: &str) -> Result<String, PluginError> {
        if !self.available.contains_key(name) {
            self.discover()?;
        }
        self.load_discovered(name).await
    }

    /// Startup policy: with `plugins.auto_load` every discovered plugin is
    /// loaded, otherwise only `plugins.enabled`. `plugins.disabled` always
    /// wins. Plugins load after their manifest dependencies; one failure
    /// does not stop the rest. Returns the names that loaded.
    pub async fn load_configured(&mut self) -> Vec<String> {
        if self.discover().is_err() {
            return Vec::new();
        }

        let settings = &self.ctx.settings;
        let auto_load = settings.get_or("plugins.auto_load", true);
        let enabled: Vec<String> = settings.get_or("plugins.enabled", Vec::new());
        let disabled: BTreeSet<String> = settings.get_or("plugins.disabled", BTreeSet::new());

        let candidates: Vec<String> = if auto_load {
            self.available.keys().cloned().collect()
        } else {
            enabled
        };

        let mut pending = Vec::new();
        for name in candidates {
            if disabled.contains(&name) || pending.contains(&name) || self.loaded.contains_key(&name) {
                continue;
            }
            if self.available.contains_key(&name) {
                pending.push(name);
            } else {
                self.report(PluginError::NotAvailable(name), "load_configured");
            }
        }

        let mut loaded = Vec::new();
        loop {
            let ready = pending.iter().position(|name| {
                self.available[name]
                    .manifest
                    .dependencies
                    .iter()
                    .all(|dep| self.loaded.contains_key(dep))
            });
            let Some(idx) = ready else { break };
            let name = pending.remove(idx);
            if let Ok(plugin) = self.load_discovered(&name).await {
                loaded.push(plugin);
            }
        }
        // Whatever is left has unmet dependencies; attempt it so the
        // failure is reported.
        for name in pending {
            if let Ok(plugin) = self.load_discovered(&name).await {
                loaded.push(plugin);
            }
        }
        loaded
    }

    // -----------------------------------------------------------------------
    // Unload / reload
    // -----------------------------------------------------------------------

    /// Remove a plugin's commands and hooks, run its cleanup and drop it
    /// from the loaded set. Cleanup errors are logged only.
    pub async fn unload_plugin(&mut self, name: &str) -> Result<(), PluginError> {
        let outcome = self.unload_inner(name).await;
        outcome.map_err(|e| self.report(e, "unload_plugin"))
    }

    async fn unload_inner(&mut self, name: &str) -> Result<(), PluginError> {
        if !self.loaded.contains_key(name) {
            return Err(PluginError::NotLoaded(name.to_string()));
        }
        let mut dependents: Vec<String> = self
            .loaded
            .values()
            .filter(|p| p.plugin.name() != name && p.plugin.dependencies().iter().any(|d| d == name))
            .map(|p| p.plugin.name().to_string())
            .collect();
        if !dependents.is_empty() {
            dependents.sort();
            return Err(PluginError::HasDependents {
                plugin: name.to_string(),
                dependents,
            });
        }

        let Some(entry) = self.loaded.remove(name) else {
            return Err(PluginError::NotLoaded(name.to_string()));
        };
        self.load_order.retain(|n| n != name);

        unbind_commands(name, &entry.commands, self.host.as_ref());
        unbind_hooks(name, &entry.hooks, &self.ctx.events);
        if let Err(e) = entry.plugin.cleanup(&self.ctx).await {
            warn!(plugin = %name, error = %e, "[Plugins] Cleanup failed");
        }
        info!(plugin = %name, "[Plugins] Unloaded");

        self.ctx.events.emit(
            Event::new(names::PLUGIN_UNLOADED, json!({ "plugin_name": name }))
                .with_source(EVENT_SOURCE),
        )?;
        Ok(())
    }

    /// Unload then load the same constructor again.
    pub async fn reload_plugin(&mut self, name: &str) -> Result<String, PluginError> {
        let Some(entry) = self.loaded.get(name) else {
            return Err(self.report(PluginError::NotLoaded(name.to_string()), "reload_plugin"));
        };
        let constructor = entry.constructor.clone();
        self.unload_plugin(name).await?;
        self.load_plugin(&constructor).await
    }

    /// Unload everything, most recently loaded first. Returns how many
    /// plugins were unloaded.
    pub async fn cleanup(&mut self) -> usize {
        let order: Vec<String> = self.load_order.iter().rev().cloned().collect();
        let mut unloaded = 0;
        for name in order {
            match self.unload_plugin(&name).await {
                Ok(()) => unloaded += 1,
                Err(e) => warn!(plugin = %name, error = %e, "[Plugins] Left loaded during cleanup"),
            }
        }
        unloaded
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Loaded plugins in load order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.load_order
            .iter()
            .filter_map(|name| self.loaded.get(name))
            .map(LoadedPlugin::info)
            .collect()
    }

    pub fn plugin(&self, name: &str) -> Option<PluginInfo> {
        self.loaded.get(name).map(LoadedPlugin::info)
    }

    pub fn plugin_commands(&self, name: &str) -> Option<Vec<String>> {
        self.loaded.get(name).map(|p| p.commands.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PluginCatalog;
    use crate::manifest::{PluginManifest, MANIFEST_FILE};
    use crate::sdk::plugin_constructor;
    use async_trait::async_trait;
    use shellforge_commands::{
        command_factory, Command, CommandEnv, CommandFactory, CommandInput, CommandSpec,
        CommandTable,
    };
    use shellforge_core::{from_fn, CapturedUi, EventHandler, MessageLevel};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Noop(String);

    #[async_trait]
    impl Command for Noop {
        fn name(&self) -> &str {
            &self.0
        }

        async fn run(&self, _input: &CommandInput) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Shape {
        name: &'static str,
        deps: Vec<&'static str>,
        commands: Vec<&'static str>,
        hook: Option<&'static str>,
        fail_init: bool,
        fail_cleanup: bool,
    }

    struct TestPlugin {
        shape: Shape,
        log: Log,
        hook: Arc<dyn EventHandler>,
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            self.shape.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn dependencies(&self) -> Vec<String> {
            self.shape.deps.iter().map(|d| d.to_string()).collect()
        }

        async fn initialize(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("init:{}", self.shape.name));
            if self.shape.fail_init {
                anyhow::bail!("boom");
            }
            Ok(())
        }

        async fn cleanup(&self, _ctx: &PluginContext) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("cleanup:{}", self.shape.name));
            if self.shape.fail_cleanup {
                anyhow::bail!("cleanup exploded");
            }
            Ok(())
        }

        fn commands(&self) -> Vec<(String, CommandFactory)> {
            self.shape
                .commands
                .iter()
                .map(|c| {
                    let name = c.to_string();
                    let factory = command_factory(move |_env: &CommandEnv| Noop(name.clone()));
                    (c.to_string(), factory)
                })
                .collect()
        }

        fn hooks(&self) -> Vec<(String, Arc<dyn EventHandler>)> {
            self.shape
                .hook
                .map(|event| vec![(event.to_string(), self.hook.clone())])
                .unwrap_or_default()
        }
    }

    struct Harness {
        ui: Arc<CapturedUi>,
        table: Arc<CommandTable>,
        manager: PluginManager,
        log: Log,
        _tmp: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_catalog(PluginCatalog::new())
        }

        fn with_catalog(catalog: PluginCatalog) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let ui = Arc::new(CapturedUi::new());
            let env = CommandEnv::standalone(ui.clone());
            let table = Arc::new(CommandTable::new(env.clone()));
            let ctx = PluginContext::new(ui.clone(), env.settings.clone(), env.events.clone());
            let reporter = Arc::new(ErrorReporter::new(ui.clone()));
            let discovery = PluginDiscovery::new(tmp.path(), catalog);
            let manager = PluginManager::new(ctx, table.clone(), reporter, discovery);
            Self {
                ui,
                table,
                manager,
                log: Arc::new(Mutex::new(Vec::new())),
                _tmp: tmp,
            }
        }

        fn ctor(&self, shape: Shape) -> PluginConstructor {
            ctor_with_log(shape, self.log.clone())
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    fn ctor_with_log(shape: Shape, log: Log) -> PluginConstructor {
        let hook = from_fn("test-hook", |_e: &Event| Ok(()));
        plugin_constructor(move |_ctx: &PluginContext| TestPlugin {
            shape: shape.clone(),
            log: log.clone(),
            hook: hook.clone(),
        })
    }

    fn named(name: &'static str) -> Shape {
        Shape {
            name,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dependency_law() {
        let mut h = Harness::new();
        let core = h.ctor(named("core"));
        let ext = h.ctor(Shape {
            deps: vec!["core"],
            ..named("ext")
        });

        let err = h.manager.load_plugin(&ext).await.unwrap_err();
        match err {
            PluginError::MissingDependencies { plugin, missing } => {
                assert_eq!(plugin, "ext");
                assert_eq!(missing, vec!["core"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!h.manager.is_loaded("ext"));

        h.manager.load_plugin(&core).await.unwrap();
        h.manager.load_plugin(&ext).await.unwrap();

        let err = h.manager.unload_plugin("core").await.unwrap_err();
        assert!(matches!(&err, PluginError::HasDependents { dependents, .. } if dependents == &["ext"]));
        assert!(err.to_string().contains("ext"));
        assert!(h.manager.is_loaded("core"));

        h.manager.unload_plugin("ext").await.unwrap();
        h.manager.unload_plugin("core").await.unwrap();
        assert!(h.manager.plugins().is_empty());
    }

    #[tokio::test]
    async fn test_commands_round_trip() {
        let mut h = Harness::new();
        let a = h.ctor(Shape {
            commands: vec!["alpha", "beta"],
            ..named("a")
        });
        let b = h.ctor(Shape {
            commands: vec!["gamma"],
            ..named("b")
        });
        h.manager.load_plugin(&a).await.unwrap();
        h.manager.load_plugin(&b).await.unwrap();

        assert_eq!(h.manager.plugin_commands("a").unwrap(), vec!["alpha", "beta"]);
        let mut plugin_cmds = h.table.category_commands("plugin");
        plugin_cmds.sort();
        assert_eq!(plugin_cmds, vec!["alpha", "beta", "gamma"]);

        h.manager.unload_plugin("a").await.unwrap();
        assert!(h.table.get_command("alpha").is_none());
        assert!(!h.table.is_registered("beta"));
        assert!(h.table.get_command("gamma").is_some());
        assert_eq!(h.table.category_commands("plugin"), vec!["gamma"]);
    }

    #[tokio::test]
    async fn test_initialize_failure_is_not_loaded() {
        let mut h = Harness::new();
        let bad = h.ctor(Shape {
            commands: vec!["bad-cmd"],
            fail_init: true,
            ..named("bad")
        });
        let err = h.manager.load_plugin(&bad).await.unwrap_err();
        assert!(matches!(err, PluginError::InitializeFailed { ref plugin, .. } if plugin == "bad"));
        assert!(!h.manager.is_loaded("bad"));
        assert!(h.table.get_command("bad-cmd").is_none());

        let ops = h.manager.context().events.completed_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].status, "failed");
        assert!(ops[0].error.as_deref().unwrap().contains("boom"));

        assert!(h.ui.contains("Plugin error:"));
        assert!(h.ui.contains("Affected plugin: bad"));
    }

    #[tokio::test]
    async fn test_command_collision_rolls_back() {
        let mut h = Harness::new();
        h.table.reserve(CommandSpec::builtin("help", ""), "system").unwrap();
        let clash = h.ctor(Shape {
            commands: vec!["fresh", "help"],
            ..named("clash")
        });
        let err = h.manager.load_plugin(&clash).await.unwrap_err();
        assert!(matches!(err, PluginError::CommandRegistration { ref command, .. } if command == "help"));
        assert!(!h.table.is_registered("fresh"));
        assert!(!h.manager.is_loaded("clash"));
        assert_eq!(h.log(), vec!["init:clash", "cleanup:clash"]);
    }

    #[tokio::test]
    async fn test_cleanup_failure_still_unloads() {
        let mut h = Harness::new();
        let p = h.ctor(Shape {
            commands: vec!["x"],
            fail_cleanup: true,
            ..named("flaky")
        });
        let seen: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        h.manager.context().events.subscribe(
            names::PLUGIN_UNLOADED,
            from_fn("sink", move |e: &Event| {
                sink.lock().unwrap().push(e.payload["plugin_name"].to_string());
                Ok(())
            }),
        );

        h.manager.load_plugin(&p).await.unwrap();
        h.manager.unload_plugin("flaky").await.unwrap();
        assert!(!h.manager.is_loaded("flaky"));
        assert!(h.table.get_command("x").is_none());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_is_correlated_operation() {
        let mut h = Harness::new();
        let p = h.ctor(named("traced"));
        h.manager.load_plugin(&p).await.unwrap();

        let events = &h.manager.context().events;
        let ops = events.completed_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, "plugin.load");
        assert_eq!(ops[0].status, "completed");
        let timeline = events.get_operation_timeline(ops[0].id);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].name, names::PLUGIN_LOADED);
        assert_eq!(timeline[0].payload["plugin_name"], "traced");
        assert_eq!(timeline[0].payload["version"], "1.0.0");
    }

    #[tokio::test]
    async fn test_hooks_follow_plugin_lifetime() {
        let mut h = Harness::new();
        let p = h.ctor(Shape {
            hook: Some("command.completed"),
            ..named("hooked")
        });
        let events = h.manager.context().events.clone();
        h.manager.load_plugin(&p).await.unwrap();
        assert_eq!(events.subscriber_count("command.completed"), 1);
        h.manager.unload_plugin("hooked").await.unwrap();
        assert_eq!(events.subscriber_count("command.completed"), 0);
    }

    #[tokio::test]
    async fn test_reload_reruns_lifecycle() {
        let mut h = Harness::new();
        let p = h.ctor(Shape {
            commands: vec!["again"],
            ..named("re")
        });
        h.manager.load_plugin(&p).await.unwrap();
        h.manager.reload_plugin("re").await.unwrap();
        assert_eq!(h.log(), vec!["init:re", "cleanup:re", "init:re"]);
        assert!(h.table.get_command("again").is_some());

        assert!(matches!(
            h.manager.reload_plugin("missing").await,
            Err(PluginError::NotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn test_name_checks() {
        let mut h = Harness::new();
        let empty = h.ctor(named(""));
        assert!(matches!(h.manager.load_plugin(&empty).await, Err(PluginError::EmptyName)));

        let p = h.ctor(named("once"));
        h.manager.load_plugin(&p).await.unwrap();
        assert!(matches!(
            h.manager.load_plugin(&p).await,
            Err(PluginError::AlreadyLoaded(_))
        ));
        assert!(matches!(
            h.manager.unload_plugin("never").await,
            Err(PluginError::NotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_unloads_in_reverse_order() {
        let mut h = Harness::new();
        let core = h.ctor(named("core"));
        let ext = h.ctor(Shape {
            deps: vec!["core"],
            ..named("ext")
        });
        h.manager.load_plugin(&core).await.unwrap();
        h.manager.load_plugin(&ext).await.unwrap();
        assert_eq!(h.manager.cleanup().await, 2);
        assert_eq!(h.log(), vec!["init:core", "init:ext", "cleanup:ext", "cleanup:core"]);
        assert!(h.manager.load_order().is_empty());
    }

    fn catalog_with(log: &Log) -> PluginCatalog {
        let mut catalog = PluginCatalog::new();
        catalog.register("alpha", ctor_with_log(Shape { deps: vec!["zeta"], ..named("alpha") }, log.clone()));
        catalog.register("zeta", ctor_with_log(named("zeta"), log.clone()));
        catalog.register("off", ctor_with_log(named("off"), log.clone()));
        catalog
    }

    fn write_manifests(root: &std::path::Path) {
        for (name, deps) in [("alpha", vec!["zeta"]), ("zeta", vec![]), ("off", vec![])] {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir).unwrap();
            let manifest = PluginManifest::new(name, "1.0.0", name)
                .with_dependencies(deps.into_iter().map(String::from).collect());
            std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&manifest).unwrap())
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_auto_load_respects_dependencies_and_disabled() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut h = Harness::with_catalog(catalog_with(&log));
        write_manifests(h.manager.discovery().root());
        h.manager
            .context()
            .settings
            .set("plugins.disabled", json!(["off"]))
            .unwrap();

        let loaded = h.manager.load_configured().await;
        assert_eq!(loaded, vec!["zeta", "alpha"]);
        assert!(!h.manager.is_loaded("off"));
        assert_eq!(h.manager.available_plugins().len(), 3);
    }

    #[tokio::test]
    async fn test_enabled_list_without_auto_load() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut h = Harness::with_catalog(catalog_with(&log));
        write_manifests(h.manager.discovery().root());
        let settings = h.manager.context().settings.clone();
        settings.set("plugins.auto_load", false).unwrap();
        settings.set("plugins.enabled", json!(["alpha", "ghost"])).unwrap();

        let loaded = h.manager.load_configured().await;
        assert!(loaded.is_empty());
        let errors = h.ui.messages_at(MessageLevel::Error);
        assert!(errors.iter().any(|m| m.contains("ghost")));
        assert!(errors.iter().any(|m| m.contains("missing dependencies for alpha: zeta")));

        settings.set("plugins.enabled", json!(["zeta", "alpha"])).unwrap();
        assert_eq!(h.manager.load_configured().await, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_load_by_name() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut h = Harness::with_catalog(catalog_with(&log));
        write_manifests(h.manager.discovery().root());
        assert_eq!(h.manager.load_by_name("zeta").await.unwrap(), "zeta");
        assert!(matches!(
            h.manager.load_by_name("nothing").await,
            Err(PluginError::NotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_manifest_name_must_match_instance() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut catalog = catalog_with(&log);
        catalog.register("renamed", ctor_with_log(named("actual"), log.clone()));
        let mut h = Harness::with_catalog(catalog);
        write_manifests(h.manager.discovery().root());
        let dir = h.manager.discovery().root().join("declared");
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = PluginManifest::new("declared", "1.0.0", "renamed");
        std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();

        let err = h.manager.load_by_name("declared").await.unwrap_err();
        assert!(matches!(err, PluginError::InvalidManifest { .. }));
        assert!(err.to_string().contains("manifest name declared does not match plugin name actual"));
        assert!(!h.manager.is_loaded("actual"));
        assert!(log.lock().unwrap().is_empty());
        assert!(h.ui.contains("does not match plugin name actual"));

        let loaded = h.manager.load_configured().await;
        assert_eq!(loaded, vec!["off", "zeta", "alpha"]);
        assert!(!h.manager.is_loaded("actual"));
    }
}
