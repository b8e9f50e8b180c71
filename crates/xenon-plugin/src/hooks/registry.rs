//! Listener registry: one hook listener per extension point, keyed by the
//! listener's state type.
//!
//! Extension points are identified by the state type's name and layout
//! rather than its `TypeId`. A plugin library carries its own copy of the
//! framework and of the host's state types, and `TypeId` is not stable
//! across separately compiled artifacts while type names are.

use std::alloc::Layout;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use super::hook::HookId;
use super::listener::{DispatchGate, HookListener};

/// Identifies an extension point by the type of its shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExtensionPoint {
    name: &'static str,
    #[serde(skip)]
    size: usize,
    #[serde(skip)]
    align: usize,
}

impl ExtensionPoint {
    /// The extension point whose state has type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Fully qualified name of the state type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Operations the manager needs on a listener without knowing its state type.
pub(crate) trait ErasedListener: Send + Sync {
    /// Removes a hook by identity.
    fn remove_hook(&self, id: HookId) -> AppResult<()>;

    /// Whether the listener is critical.
    fn is_critical(&self) -> bool;
}

impl<T: Send + 'static> ErasedListener for HookListener<T> {
    fn remove_hook(&self, id: HookId) -> AppResult<()> {
        self.remove(id)
    }

    fn is_critical(&self) -> bool {
        HookListener::is_critical(self)
    }
}

/// A registered listener and the layout of its concrete type.
struct ListenerEntry {
    erased: Arc<dyn ErasedListener>,
    layout: Layout,
}

/// Extension point → listener. Populated at startup, never shrinks.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<ExtensionPoint, ListenerEntry>,
}

impl ListenerRegistry {
    /// Registers the listener for `T`, binding it to `gate`.
    pub(crate) fn insert<T: Send + 'static>(
        &mut self,
        listener: Arc<HookListener<T>>,
        gate: &DispatchGate,
    ) -> AppResult<ExtensionPoint> {
        let point = ExtensionPoint::of::<T>();
        if self.listeners.contains_key(&point) {
            return Err(AppError::contract(format!(
                "Found duplicate hook listeners for '{point}'"
            )));
        }
        if !listener.attach(gate) {
            return Err(AppError::contract(format!(
                "Hook listener for '{point}' is already registered with another plugin manager"
            )));
        }

        self.listeners.insert(
            point,
            ListenerEntry {
                erased: listener,
                layout: Layout::new::<HookListener<T>>(),
            },
        );
        Ok(point)
    }

    /// Returns the typed listener for `T`.
    pub(crate) fn typed<T: Send + 'static>(&self) -> Option<Arc<HookListener<T>>> {
        let entry = self.listeners.get(&ExtensionPoint::of::<T>())?;
        if entry.layout != Layout::new::<HookListener<T>>() {
            return None;
        }
        let raw = Arc::into_raw(Arc::clone(&entry.erased)) as *const HookListener<T>;
        // SAFETY: the entry was inserted as a `HookListener<S>` whose state type
        // `S` has the same name and layout as `T`, so `raw` points at the value
        // of a live `Arc<HookListener<T>>` allocation whose count we own.
        Some(unsafe { Arc::from_raw(raw) })
    }

    /// Returns the erased listener for `point`.
    pub(crate) fn get(&self, point: &ExtensionPoint) -> Option<&Arc<dyn ErasedListener>> {
        self.listeners.get(point).map(|entry| &entry.erased)
    }

    /// Registered extension points.
    pub(crate) fn points(&self) -> Vec<ExtensionPoint> {
        self.listeners.keys().copied().collect()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("extension_points", &self.points())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::hooks::{Hook, Priority};

    struct Alpha;
    struct Beta;

    fn gate() -> DispatchGate {
        Arc::new(RwLock::new(()))
    }

    #[test]
    fn test_extension_point_identity_is_type() {
        assert_eq!(ExtensionPoint::of::<Alpha>(), ExtensionPoint::of::<Alpha>());
        assert_ne!(ExtensionPoint::of::<Alpha>(), ExtensionPoint::of::<Beta>());
        assert!(ExtensionPoint::of::<Alpha>().name().ends_with("Alpha"));
        assert_ne!(ExtensionPoint::of::<u32>(), ExtensionPoint::of::<u64>());
    }

    #[test]
    fn test_extension_point_serializes_name_only() {
        let json = serde_json::to_value(ExtensionPoint::of::<Vec<String>>()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": std::any::type_name::<Vec<String>>() })
        );
    }

    #[test]
    fn test_duplicate_listener_rejected() {
        let gate = gate();
        let mut registry = ListenerRegistry::default();
        registry
            .insert(Arc::new(HookListener::new(Alpha, false)), &gate)
            .unwrap();

        let err = registry
            .insert(Arc::new(HookListener::new(Alpha, true)), &gate)
            .unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(registry.points().len(), 1);
    }

    #[test]
    fn test_typed_lookup_returns_same_listener() {
        let gate = gate();
        let mut registry = ListenerRegistry::default();
        let listener = Arc::new(HookListener::new(0u32, false));
        registry.insert(listener.clone(), &gate).unwrap();

        let typed = registry.typed::<u32>().expect("registered");
        assert!(Arc::ptr_eq(&typed, &listener));
        assert!(registry.typed::<u64>().is_none());
    }

    #[test]
    fn test_erased_remove_reaches_listener() {
        let gate = gate();
        let mut registry = ListenerRegistry::default();
        let listener = Arc::new(HookListener::new(0u32, true));
        let point = registry.insert(listener.clone(), &gate).unwrap();

        let hook = Hook::new(|_: &mut u32| false);
        listener.register(hook.clone(), Priority::Normal);

        let erased = registry.get(&point).expect("registered");
        assert!(erased.is_critical());
        erased.remove_hook(hook.id()).unwrap();
        assert!(listener.is_empty());
        assert!(erased.remove_hook(hook.id()).is_err());
    }

    #[test]
    fn test_listener_cannot_join_two_managers() {
        let listener = Arc::new(HookListener::new(Beta, false));
        let mut first = ListenerRegistry::default();
        let mut second = ListenerRegistry::default();

        first.insert(listener.clone(), &gate()).unwrap();
        let err = second.insert(listener, &gate()).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
