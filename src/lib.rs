//! # xenon-host
//!
//! Extension points the Xenon host exposes to plugins. A plugin registers
//! hooks against these state types; the host owns one listener per type and
//! dispatches it at the matching moment of its lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use xenon_core::config::PluginConfig;
use xenon_core::result::AppResult;
use xenon_plugin::{HookListener, Plugin, PluginManager, ReconcileReport};

/// Dispatched once after the initial plugin set is loaded.
///
/// Startup hooks usually wire long-lived behavior into the host, so the
/// listener is critical: removing one of its hooks advises a restart.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StartupState {
    /// Version of the running host.
    pub host_version: String,
    /// Names of the plugins loaded when startup was dispatched.
    pub plugins: Vec<String>,
    /// Lines reported by hooks.
    pub messages: Vec<String>,
}

/// Dispatched once before every plugin is unloaded at shutdown.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ShutdownState {
    /// Why the host is stopping.
    pub reason: String,
    /// Lines reported by hooks.
    pub messages: Vec<String>,
}

/// Listeners of the host's extension points.
#[derive(Debug, Clone)]
pub struct HostListeners {
    pub startup: Arc<HookListener<StartupState>>,
    pub shutdown: Arc<HookListener<ShutdownState>>,
}

impl HostListeners {
    /// Creates the host's listeners and registers them with `manager`.
    pub fn register(manager: &PluginManager) -> AppResult<Self> {
        let listeners = Self {
            startup: Arc::new(HookListener::new(
                StartupState {
                    host_version: env!("CARGO_PKG_VERSION").to_string(),
                    ..StartupState::default()
                },
                true,
            )),
            shutdown: Arc::new(HookListener::new(ShutdownState::default(), false)),
        };

        manager.register_hook_listener(listeners.startup.clone())?;
        manager.register_hook_listener(listeners.shutdown.clone())?;
        Ok(listeners)
    }
}

/// Scans the plugin directory and, when `auto_load` is set, reconciles the
/// loaded set to every scanned plugin that is not disabled.
///
/// Returns `None` when nothing was reconciled.
pub fn sync_plugins(
    manager: &PluginManager,
    config: &PluginConfig,
) -> AppResult<Option<ReconcileReport>> {
    manager.scan_for_plugins()?;
    if !config.auto_load {
        debug!("Automatic plugin loading disabled");
        return Ok(None);
    }

    let desired: HashSet<Plugin> = manager
        .scanned_plugins()
        .unwrap_or_default()
        .into_iter()
        .filter(|plugin| !config.is_disabled(plugin.name()))
        .collect();

    let report = manager.update_loaded_plugins_diff(&desired);
    for (plugin, e) in &report.failed {
        warn!(plugin = %plugin.name(), error = %e, "Plugin left out of the loaded set");
    }
    if report.restart_advised {
        warn!("Critical hooks were removed, a host restart is advised");
    }
    Ok(Some(report))
}
