//! Plugin builder: the registration handle passed to a plugin entry point.
//!
//! The builder collects every hook a plugin registers while its entry point
//! runs. Nothing reaches a listener until the manager calls
//! [`PluginBuilder::finish`] after the entry point returned successfully, so
//! a failing entry point leaves every listener untouched.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use crate::hooks::registry::ListenerRegistry;
use crate::hooks::{ExtensionPoint, Hook, HookId, HookListener, Priority};
use crate::plugin::Plugin;

/// A hook committed to a listener on behalf of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookBinding {
    /// Identity of the hook.
    #[serde(skip)]
    pub hook: HookId,
    /// Extension point the hook is registered on.
    pub extension_point: ExtensionPoint,
    /// Priority the hook was registered with.
    pub priority: Priority,
}

/// A registration waiting for the entry point to finish.
trait PendingHook {
    /// Identity of the (hook, extension point) pair.
    fn key(&self) -> (HookId, ExtensionPoint);

    /// Inserts the hook into its listener.
    fn commit(self: Box<Self>) -> HookBinding;
}

struct Pending<T> {
    listener: Arc<HookListener<T>>,
    hook: Hook<T>,
    priority: Priority,
}

impl<T: Send + 'static> PendingHook for Pending<T> {
    fn key(&self) -> (HookId, ExtensionPoint) {
        (self.hook.id(), ExtensionPoint::of::<T>())
    }

    fn commit(self: Box<Self>) -> HookBinding {
        let binding = HookBinding {
            hook: self.hook.id(),
            extension_point: ExtensionPoint::of::<T>(),
            priority: self.priority,
        };
        self.listener.register(self.hook, self.priority);
        binding
    }
}

/// Collects the hooks of one plugin during its entry point.
pub struct PluginBuilder<'a> {
    plugin: &'a Plugin,
    listeners: &'a ListenerRegistry,
    pending: Vec<Box<dyn PendingHook>>,
}

impl<'a> PluginBuilder<'a> {
    pub(crate) fn new(plugin: &'a Plugin, listeners: &'a ListenerRegistry) -> Self {
        info!(plugin = %plugin.name(), "Building plugin");
        Self {
            plugin,
            listeners,
            pending: Vec::with_capacity(16),
        }
    }

    /// The plugin being built.
    pub fn plugin(&self) -> &Plugin {
        self.plugin
    }

    /// Registers `hook` on the extension point whose state is `T`.
    ///
    /// Fails with a contract violation when the host registered no listener
    /// for `T`.
    pub fn register_hook<T: Send + 'static>(
        &mut self,
        hook: Hook<T>,
        priority: Priority,
    ) -> AppResult<()> {
        let point = ExtensionPoint::of::<T>();
        let listener = self.listeners.typed::<T>().ok_or_else(|| {
            AppError::contract(format!(
                "Plugin '{}' registered a hook for '{point}' which has no hook listener",
                self.plugin.name()
            ))
        })?;

        debug!(
            plugin = %self.plugin.name(),
            extension_point = %point,
            priority = %priority,
            "Registering hook"
        );

        self.pending.push(Box::new(Pending {
            listener,
            hook,
            priority,
        }));
        Ok(())
    }

    /// Wraps `callback` into a hook and registers it.
    pub fn hook<T, F>(&mut self, priority: Priority, callback: F) -> AppResult<()>
    where
        T: Send + 'static,
        F: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        self.register_hook(Hook::new(callback), priority)
    }

    /// Number of registrations collected so far, duplicates included.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Commits the collected hooks to their listeners, dropping repeated
    /// registrations of the same hook on the same extension point.
    pub(crate) fn finish(self) -> Vec<HookBinding> {
        let mut seen = HashSet::new();
        let bindings: Vec<HookBinding> = self
            .pending
            .into_iter()
            .filter(|pending| seen.insert(pending.key()))
            .map(|pending| pending.commit())
            .collect();

        info!(
            plugin = %self.plugin.name(),
            hooks = bindings.len(),
            "Finished building plugin"
        );
        bindings
    }
}

impl fmt::Debug for PluginBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBuilder")
            .field("plugin", &self.plugin.name())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::plugin::ARCHIVE_SEPARATOR;

    #[derive(Debug, Default)]
    struct Greeting {
        lines: Vec<String>,
    }

    struct Unlistened;

    fn fixture() -> (Plugin, ListenerRegistry, Arc<HookListener<Greeting>>) {
        let plugin =
            Plugin::wrap("p.xpl", "greeter", ARCHIVE_SEPARATOR, "net.demo.Main", None).unwrap();
        let listener = Arc::new(HookListener::new(Greeting::default(), false));
        let mut registry = ListenerRegistry::default();
        registry
            .insert(listener.clone(), &Arc::new(RwLock::new(())))
            .unwrap();
        (plugin, registry, listener)
    }

    #[test]
    fn test_nothing_reaches_listener_before_finish() {
        let (plugin, registry, listener) = fixture();
        let mut builder = PluginBuilder::new(&plugin, &registry);
        builder
            .hook(Priority::Normal, |g: &mut Greeting| {
                g.lines.push("hi".into());
                false
            })
            .unwrap();

        assert_eq!(builder.pending(), 1);
        assert!(listener.is_empty());

        let bindings = builder.finish();
        assert_eq!(bindings.len(), 1);
        assert_eq!(listener.len(), 1);
    }

    #[test]
    fn test_dropped_builder_commits_nothing() {
        let (plugin, registry, listener) = fixture();
        let mut builder = PluginBuilder::new(&plugin, &registry);
        builder.hook(Priority::Top, |_: &mut Greeting| true).unwrap();
        drop(builder);

        assert!(listener.is_empty());
    }

    #[test]
    fn test_duplicate_registration_committed_once() {
        let (plugin, registry, listener) = fixture();
        let hook = Hook::new(|g: &mut Greeting| {
            g.lines.push("once".into());
            false
        });

        let mut builder = PluginBuilder::new(&plugin, &registry);
        builder.register_hook(hook.clone(), Priority::High).unwrap();
        builder.register_hook(hook.clone(), Priority::High).unwrap();
        assert_eq!(builder.pending(), 2);

        let bindings = builder.finish();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].hook, hook.id());
        assert_eq!(listener.len(), 1);

        listener.dispatch();
        assert_eq!(listener.state().lines, vec!["once".to_string()]);
    }

    #[test]
    fn test_unknown_extension_point_is_contract_violation() {
        let (plugin, registry, _) = fixture();
        let mut builder = PluginBuilder::new(&plugin, &registry);

        let err = builder
            .hook(Priority::Normal, |_: &mut Unlistened| false)
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(builder.pending(), 0);
    }
}
