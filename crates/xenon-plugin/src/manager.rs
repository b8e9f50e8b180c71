//! Plugin manager: lifecycle management for all plugins.
//!
//! The manager is the single authority over listeners, discovered plugins,
//! their committed hooks and their loaders. Every registry lives behind one
//! coarse lock, and listeners registered here share the manager's dispatch
//! gate so that a dispatch never observes a half-applied load, unload or
//! reconciliation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use xenon_core::config::PluginConfig;
use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use crate::builder::{HookBinding, PluginBuilder};
use crate::hooks::listener::DispatchGate;
use crate::hooks::registry::ListenerRegistry;
use crate::hooks::{ExtensionPoint, HookListener};
use crate::loader::{EntryPoint, IsolatedLoader, LoaderFactory};
use crate::manifest::{ManifestReader, ZipManifestReader};
use crate::plugin::{Plugin, PluginInfo};
use crate::scanner;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Whether an unload touched a critical listener.
    pub restart_advised: bool,
    /// Plugins loaded by this pass.
    pub loaded: Vec<Plugin>,
    /// Plugins unloaded by this pass.
    pub unloaded: Vec<Plugin>,
    /// Plugins whose load or unload failed, with the reason.
    pub failed: Vec<(Plugin, AppError)>,
}

impl ReconcileReport {
    /// Whether the pass changed nothing and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.loaded.is_empty() && self.unloaded.is_empty() && self.failed.is_empty()
    }
}

/// Registries guarded by the manager's lock.
#[derive(Default)]
struct ManagerState {
    listeners: ListenerRegistry,
    hooks_by_plugin: HashMap<Plugin, Vec<HookBinding>>,
    loaders: HashMap<Plugin, Box<dyn IsolatedLoader>>,
    loaded: HashSet<Plugin>,
    loaded_at: HashMap<Plugin, DateTime<Utc>>,
    /// `None` until the first scan.
    scanned: Option<HashSet<Plugin>>,
}

impl ManagerState {
    fn load(&mut self, plugin: &Plugin, factory: &dyn LoaderFactory) -> AppResult<()> {
        if self.loaded.contains(plugin) {
            return Err(AppError::contract(format!(
                "Plugin '{}' is already loaded",
                plugin.name()
            )));
        }

        let mut loader = factory.isolate(plugin)?;
        let mut builder = PluginBuilder::new(plugin, &self.listeners);
        let outcome = loader
            .load_entry_point()
            .and_then(|entry| invoke(entry, &mut builder, plugin));

        if let Err(e) = outcome {
            // Pending hooks hold plugin code; they go before the loader does.
            drop(builder);
            drop(loader);
            return Err(e);
        }

        let bindings = builder.finish();
        for binding in &bindings {
            debug!(
                plugin = %plugin.name(),
                extension_point = %binding.extension_point,
                priority = %binding.priority,
                "Hook committed"
            );
        }

        self.hooks_by_plugin.insert(plugin.clone(), bindings);
        self.loaders.insert(plugin.clone(), loader);
        self.loaded.insert(plugin.clone());
        self.loaded_at.insert(plugin.clone(), Utc::now());
        Ok(())
    }

    fn unload(&mut self, plugin: &Plugin) -> AppResult<bool> {
        let bindings = self.hooks_by_plugin.get(plugin).cloned().ok_or_else(|| {
            AppError::contract(format!("Plugin '{}' is not loaded", plugin.name()))
        })?;

        let mut restart_advised = false;
        for (index, binding) in bindings.iter().enumerate() {
            let removed = self
                .listeners
                .get(&binding.extension_point)
                .ok_or_else(|| {
                    AppError::internal(format!(
                        "No hook listener for '{}' while unloading '{}'",
                        binding.extension_point,
                        plugin.name()
                    ))
                })
                .and_then(|listener| {
                    listener.remove_hook(binding.hook)?;
                    Ok(listener.is_critical())
                });

            match removed {
                Ok(critical) => restart_advised |= critical,
                Err(e) => {
                    // The plugin stays loaded with the hooks not yet removed.
                    if let Some(remaining) = self.hooks_by_plugin.get_mut(plugin) {
                        *remaining = bindings[index + 1..].to_vec();
                    }
                    return Err(e);
                }
            }
        }

        self.hooks_by_plugin.remove(plugin);
        self.loaded.remove(plugin);
        self.loaded_at.remove(plugin);
        // Hooks are gone from every listener, so the plugin's code can go.
        if let Some(loader) = self.loaders.remove(plugin) {
            debug!(plugin = %loader.plugin().name(), "Releasing plugin loader");
            drop(loader);
        }

        info!(
            plugin = %plugin.name(),
            hooks = bindings.len(),
            restart_advised,
            "Plugin unloaded"
        );
        Ok(restart_advised)
    }

    fn info(&self, plugin: &Plugin) -> PluginInfo {
        let mut info = PluginInfo::unloaded(plugin);
        if let Some(bindings) = self.hooks_by_plugin.get(plugin) {
            let points: BTreeSet<&str> = bindings
                .iter()
                .map(|binding| binding.extension_point.name())
                .collect();
            info.loaded = true;
            info.extension_points = points.into_iter().map(String::from).collect();
            info.loaded_at = self.loaded_at.get(plugin).copied();
        }
        info
    }
}

/// Runs `entry`, turning errors and panics into host-owned load failures.
///
/// Nothing allocated by the plugin (error sources, panic payloads) is
/// returned, so the caller may drop the plugin's loader right after.
fn invoke(entry: EntryPoint, builder: &mut PluginBuilder<'_>, plugin: &Plugin) -> AppResult<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| entry(builder))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AppError::new(
            e.kind,
            format!(
                "Entry point of plugin '{}' failed: {}",
                plugin.name(),
                e.message
            ),
        )),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            drop(payload);
            Err(AppError::plugin(format!(
                "Entry point of plugin '{}' panicked: {reason}",
                plugin.name()
            )))
        }
    }
}

/// Manages the full lifecycle of plugins: scan, load, reconcile, unload.
pub struct PluginManager {
    directory: PathBuf,
    extension: String,
    loaders: Box<dyn LoaderFactory>,
    manifests: Box<dyn ManifestReader>,
    gate: DispatchGate,
    state: Mutex<ManagerState>,
}

impl PluginManager {
    /// Creates a manager scanning `config.directory` for archives with
    /// `config.extension`, loading them through `loaders`.
    pub fn new(config: &PluginConfig, loaders: impl LoaderFactory + 'static) -> Self {
        Self {
            directory: config.directory.clone(),
            extension: config.extension.clone(),
            loaders: Box::new(loaders),
            manifests: Box::new(ZipManifestReader),
            gate: Arc::new(RwLock::new(())),
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Replaces the manifest reader.
    pub fn with_manifest_reader(mut self, reader: impl ManifestReader + 'static) -> Self {
        self.manifests = Box::new(reader);
        self
    }

    /// Directory scanned for plugin archives.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers the host's listener for the extension point whose state is
    /// `T`. Fails with a contract violation if one is already registered.
    pub fn register_hook_listener<T: Send + 'static>(
        &self,
        listener: Arc<HookListener<T>>,
    ) -> AppResult<ExtensionPoint> {
        let critical = listener.is_critical();
        let point = self
            .lock()
            .listeners
            .insert(listener, &self.gate)
            .inspect_err(|e| error!(error = %e, "Hook listener rejected"))?;

        info!(extension_point = %point, critical, "Hook listener registered");
        Ok(point)
    }

    /// Extension points with a registered listener.
    pub fn extension_points(&self) -> Vec<ExtensionPoint> {
        self.lock().listeners.points()
    }

    /// Scans the plugin directory, replacing the previous scan result.
    ///
    /// Returns the number of plugins discovered.
    pub fn scan_for_plugins(&self) -> AppResult<usize> {
        let plugins =
            scanner::scan_directory(&self.directory, &self.extension, self.manifests.as_ref())?;
        let count = plugins.len();
        self.lock().scanned = Some(plugins);
        Ok(count)
    }

    /// Result of the last scan, `None` before the first one.
    pub fn scanned_plugins(&self) -> Option<HashSet<Plugin>> {
        self.lock().scanned.clone()
    }

    /// Currently loaded plugins.
    pub fn loaded_plugins(&self) -> HashSet<Plugin> {
        self.lock().loaded.clone()
    }

    /// Scanned plugins that are not loaded.
    ///
    /// Fails with a contract violation before the first scan.
    pub fn unloaded_plugins(&self) -> AppResult<HashSet<Plugin>> {
        let state = self.lock();
        let scanned = state.scanned.as_ref().ok_or_else(|| {
            AppError::contract("Unloaded plugins queried before scanning for plugins")
        })?;
        Ok(scanned.difference(&state.loaded).cloned().collect())
    }

    /// Whether `plugin` is loaded.
    pub fn is_loaded(&self, plugin: &Plugin) -> bool {
        self.lock().loaded.contains(plugin)
    }

    /// Hooks committed on behalf of `plugin`, `None` if it is not loaded.
    pub fn hook_bindings(&self, plugin: &Plugin) -> Option<Vec<HookBinding>> {
        self.lock().hooks_by_plugin.get(plugin).cloned()
    }

    /// Snapshot of every scanned or loaded plugin, ordered by name.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        let state = self.lock();
        let mut known: HashSet<&Plugin> = state.loaded.iter().collect();
        if let Some(scanned) = &state.scanned {
            known.extend(scanned.iter());
        }

        let mut infos: Vec<PluginInfo> = known.into_iter().map(|p| state.info(p)).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Loads `plugin`: runs its entry point and commits the hooks it
    /// registered. A failure leaves every registry untouched.
    pub fn load_plugin(&self, plugin: &Plugin) -> AppResult<()> {
        let mut state = self.lock();
        let _gate = self.exclusive();
        state
            .load(plugin, self.loaders.as_ref())
            .inspect(|()| info!(plugin = %plugin.name(), "Plugin loaded"))
            .inspect_err(|e| error!(plugin = %plugin.name(), error = %e, "Plugin load failed"))
    }

    /// Unloads `plugin`, returning whether a restart is advisable.
    ///
    /// Unloading a plugin that is not loaded is a contract violation.
    pub fn unload_plugin(&self, plugin: &Plugin) -> AppResult<bool> {
        let mut state = self.lock();
        let _gate = self.exclusive();
        let restart_advised = state
            .unload(plugin)
            .inspect_err(|e| error!(plugin = %plugin.name(), error = %e, "Plugin unload failed"))?;
        if restart_advised {
            warn!(plugin = %plugin.name(), "Critical hooks removed, restart advised");
        }
        Ok(restart_advised)
    }

    /// Brings the loaded set to `desired`: unloads every loaded plugin not
    /// in `desired`, then loads every desired plugin not yet loaded.
    ///
    /// Plugins in both sets are left alone. A failing plugin is reported and
    /// does not stop the pass.
    pub fn update_loaded_plugins_diff(&self, desired: &HashSet<Plugin>) -> ReconcileReport {
        let mut state = self.lock();
        let _gate = self.exclusive();

        let mut to_unload: Vec<Plugin> = state.loaded.difference(desired).cloned().collect();
        let mut to_load: Vec<Plugin> = desired.difference(&state.loaded).cloned().collect();
        to_unload.sort_by(|a, b| a.name().cmp(b.name()));
        to_load.sort_by(|a, b| a.name().cmp(b.name()));

        let mut report = ReconcileReport::default();
        for plugin in to_unload {
            match state.unload(&plugin) {
                Ok(restart) => {
                    report.restart_advised |= restart;
                    report.unloaded.push(plugin);
                }
                Err(e) => {
                    error!(plugin = %plugin.name(), error = %e, "Plugin unload failed");
                    report.failed.push((plugin, e));
                }
            }
        }
        for plugin in to_load {
            match state.load(&plugin, self.loaders.as_ref()) {
                Ok(()) => report.loaded.push(plugin),
                Err(e) => {
                    error!(plugin = %plugin.name(), error = %e, "Plugin load failed");
                    report.failed.push((plugin, e));
                }
            }
        }

        if !report.is_noop() {
            info!(
                loaded = report.loaded.len(),
                unloaded = report.unloaded.len(),
                failed = report.failed.len(),
                restart_advised = report.restart_advised,
                "Reconciled loaded plugins"
            );
        }
        report
    }

    /// Unloads every loaded plugin.
    pub fn unload_all(&self) -> ReconcileReport {
        let report = self.update_loaded_plugins_diff(&HashSet::new());
        info!(unloaded = report.unloaded.len(), "All plugins unloaded");
        report
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PluginManager")
            .field("directory", &self.directory)
            .field("extension", &self.extension)
            .field("loaders", &self.loaders)
            .field("listeners", &state.listeners)
            .field("scanned", &state.scanned.as_ref().map(HashSet::len))
            .field("loaded", &state.loaded.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::archive::test_support::write_archive;
    use crate::hooks::Priority;
    use crate::loader::StaticLoaderFactory;
    use crate::manifest::{MANIFEST_PATH, Manifest};
    use crate::plugin::ARCHIVE_SEPARATOR;

    #[derive(Debug, Default)]
    struct Counter {
        hits: u32,
    }

    fn counting(builder: &mut PluginBuilder<'_>) -> AppResult<()> {
        builder.hook(Priority::Normal, |c: &mut Counter| {
            c.hits += 1;
            false
        })
    }

    fn panicking(_: &mut PluginBuilder<'_>) -> AppResult<()> {
        panic!("boom");
    }

    fn counting_twice(builder: &mut PluginBuilder<'_>) -> AppResult<()> {
        counting(builder)?;
        builder.hook(Priority::High, |c: &mut Counter| {
            c.hits += 10;
            false
        })
    }

    fn slow(builder: &mut PluginBuilder<'_>) -> AppResult<()> {
        thread::sleep(Duration::from_millis(100));
        counting(builder)
    }

    fn manager_with(dir: &Path, entry: EntryPoint) -> (PluginManager, Plugin) {
        let config = PluginConfig {
            directory: dir.to_path_buf(),
            ..PluginConfig::default()
        };
        let entry_path = Plugin::entry_path_for("net.demo.Main", ARCHIVE_SEPARATOR);
        write_archive(
            dir,
            "demo.xpl",
            &[
                (MANIFEST_PATH, "Main-Class: net.demo.Main\nXePlugin-Name: demo\n"),
                (entry_path.as_str(), "code"),
            ],
        );

        let manager = PluginManager::new(
            &config,
            StaticLoaderFactory::new().with_entry_point("net.demo.Main", entry),
        );
        manager.scan_for_plugins().unwrap();
        let plugin = manager.unloaded_plugins().unwrap().into_iter().next().unwrap();
        (manager, plugin)
    }

    #[test]
    fn test_panicking_entry_point_is_load_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (manager, plugin) = manager_with(dir.path(), panicking);
        manager
            .register_hook_listener(Arc::new(HookListener::new(Counter::default(), false)))
            .unwrap();

        let err = manager.load_plugin(&plugin).unwrap_err();
        assert_eq!(err.kind, xenon_core::ErrorKind::Plugin);
        assert!(err.message.contains("boom"));
        assert!(!manager.is_loaded(&plugin));
    }

    #[test]
    fn test_plugins_snapshot_reports_load_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (manager, plugin) = manager_with(dir.path(), counting);
        manager
            .register_hook_listener(Arc::new(HookListener::new(Counter::default(), false)))
            .unwrap();

        assert!(!manager.plugins()[0].loaded);
        manager.load_plugin(&plugin).unwrap();

        let infos = manager.plugins();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].loaded);
        assert!(infos[0].loaded_at.is_some());
        assert_eq!(infos[0].extension_points.len(), 1);
        assert!(infos[0].extension_points[0].ends_with("Counter"));
    }

    #[test]
    fn test_dispatch_waits_for_load_to_finish() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (manager, plugin) = manager_with(dir.path(), slow);
        let listener = Arc::new(HookListener::new(Counter::default(), false));
        manager.register_hook_listener(listener.clone()).unwrap();

        let manager = Arc::new(manager);
        let started = Arc::new(AtomicBool::new(false));
        let loading = {
            let manager = manager.clone();
            let started = started.clone();
            thread::spawn(move || {
                let mut state = manager.lock();
                let _gate = manager.exclusive();
                started.store(true, Ordering::SeqCst);
                state.load(&plugin, manager.loaders.as_ref())
            })
        };

        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        // Blocks on the gate until the load has committed its hook.
        listener.dispatch();
        assert_eq!(listener.state().hits, 1);

        loading.join().unwrap().unwrap();
    }

    #[test]
    fn test_failed_unload_keeps_plugin_consistent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (manager, plugin) = manager_with(dir.path(), counting_twice);
        let listener = Arc::new(HookListener::new(Counter::default(), true));
        manager.register_hook_listener(listener.clone()).unwrap();
        manager.load_plugin(&plugin).unwrap();

        let bindings = manager.hook_bindings(&plugin).expect("loaded");
        assert_eq!(bindings.len(), 2);
        // Take the first hook away behind the manager's back.
        listener.remove(bindings[0].hook).unwrap();

        let err = manager.unload_plugin(&plugin).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(manager.is_loaded(&plugin));
        assert_eq!(manager.hook_bindings(&plugin), Some(bindings[1..].to_vec()));
        assert_eq!(listener.len(), 1);

        assert!(manager.unload_plugin(&plugin).unwrap());
        assert!(!manager.is_loaded(&plugin));
        assert!(manager.hook_bindings(&plugin).is_none());
        assert!(listener.is_empty());
    }

    #[derive(Debug)]
    struct FixedManifest;

    impl ManifestReader for FixedManifest {
        fn read_manifest(&self, _: &Path) -> AppResult<Manifest> {
            Ok(Manifest {
                main_class: Some("net.demo.Fixed".into()),
                name: Some("fixed".into()),
                logo: Some("logo.png".into()),
            })
        }

        fn read_entry(&self, _: &Path, entry: &str) -> AppResult<Vec<u8>> {
            Err(AppError::archive(format!("no entry '{entry}'")))
        }
    }

    #[test]
    fn test_custom_manifest_reader() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("raw.xpl"), b"").unwrap();
        let config = PluginConfig {
            directory: dir.path().to_path_buf(),
            ..PluginConfig::default()
        };

        let manager = PluginManager::new(&config, StaticLoaderFactory::new())
            .with_manifest_reader(FixedManifest);
        manager
            .register_hook_listener(Arc::new(HookListener::new(Counter::default(), false)))
            .unwrap();
        assert_eq!(manager.extension_points().len(), 1);

        assert_eq!(manager.scan_for_plugins().unwrap(), 1);
        let plugin = manager.unloaded_plugins().unwrap().into_iter().next().unwrap();
        assert_eq!(plugin.name(), "fixed");
        assert!(plugin.logo().is_none());
    }
}
