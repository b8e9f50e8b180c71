//! Hook listener: the ordered chain of hooks bound to one extension point.
//!
//! A listener owns the extension point's shared state and a priority-sorted
//! chain of hooks. Dispatch runs the hooks in chain order against the state
//! and stops at the first hook reporting that it handled the state.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, RwLockReadGuard};

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use super::hook::{Hook, HookId};
use super::priority::Priority;

/// Lock shared between a manager and its listeners.
///
/// Dispatch holds it shared; load, unload and reconciliation hold it
/// exclusively.
pub(crate) type DispatchGate = Arc<RwLock<()>>;

thread_local! {
    /// Addresses of the dispatch gates this thread currently holds shared.
    static HELD_GATES: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Shared hold on a dispatch gate, re-entrant within one thread.
///
/// A hook that dispatches another listener of the same manager reuses the
/// hold taken by the outer dispatch instead of queueing behind a writer.
struct GateHold<'a> {
    key: usize,
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

impl<'a> GateHold<'a> {
    fn acquire(gate: &'a DispatchGate) -> Self {
        let key = Arc::as_ptr(gate) as usize;
        let nested = HELD_GATES.with(|held| held.borrow().contains(&key));
        let guard = if nested {
            None
        } else {
            Some(gate.read().unwrap_or_else(|e| e.into_inner()))
        };
        HELD_GATES.with(|held| held.borrow_mut().push(key));
        Self { key, _guard: guard }
    }
}

impl Drop for GateHold<'_> {
    fn drop(&mut self) {
        HELD_GATES.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(index) = held.iter().rposition(|key| *key == self.key) {
                held.remove(index);
            }
        });
    }
}

/// Hooks and their priorities, kept in descending-priority order.
///
/// `hooks.len() == priorities.len()` always holds.
struct HookChain<T> {
    hooks: Vec<Hook<T>>,
    priorities: Vec<Priority>,
}

impl<T> HookChain<T> {
    fn new() -> Self {
        Self {
            hooks: Vec::new(),
            priorities: Vec::new(),
        }
    }

    /// Inserts before the first entry with a strictly lower priority, so
    /// equal priorities keep registration order.
    fn insert(&mut self, hook: Hook<T>, priority: Priority) {
        let index = self
            .priorities
            .iter()
            .position(|p| *p < priority)
            .unwrap_or(self.priorities.len());
        self.hooks.insert(index, hook);
        self.priorities.insert(index, priority);
    }

    fn remove(&mut self, id: HookId) -> Option<Priority> {
        let index = self.hooks.iter().position(|h| h.id() == id)?;
        self.hooks.remove(index);
        Some(self.priorities.remove(index))
    }
}

/// The live chain of hooks for one extension point.
///
/// Created once per extension point by the host at startup and shared with
/// the [`PluginManager`](crate::manager::PluginManager) as an
/// `Arc<HookListener<T>>`. Plugins never create listeners.
pub struct HookListener<T> {
    /// Shared state every hook observes and may mutate.
    state: Mutex<T>,
    /// Ordered hooks.
    chain: RwLock<HookChain<T>>,
    /// Whether removing hooks from this listener warrants a restart.
    critical: bool,
    /// Gate of the manager this listener is registered with.
    gate: OnceLock<DispatchGate>,
}

impl<T> HookListener<T> {
    /// Creates a listener owning `state`.
    pub fn new(state: T, critical: bool) -> Self {
        Self {
            state: Mutex::new(state),
            chain: RwLock::new(HookChain::new()),
            critical,
            gate: OnceLock::new(),
        }
    }

    /// Returns whether removing hooks from this listener should trigger a
    /// restart advisory.
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Locks and returns the shared state.
    ///
    /// Must not be held across a call to [`dispatch`](Self::dispatch).
    pub fn state(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.chain().hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Priorities of the registered hooks, in dispatch order.
    pub fn priorities(&self) -> Vec<Priority> {
        self.chain().priorities.clone()
    }

    /// Runs every hook in order against the shared state, stopping at the
    /// first one that returns `true`.
    ///
    /// Returns whether some hook handled the state. An empty listener is a
    /// no-op returning `false`. Hooks may dispatch other listeners; they must
    /// not dispatch the listener they are registered on.
    pub fn dispatch(&self) -> bool {
        let _gate = self.gate.get().map(GateHold::acquire);
        let chain = self.chain();
        if chain.hooks.is_empty() {
            return false;
        }

        let mut state = self.state();
        chain.hooks.iter().any(|hook| hook.call(&mut *state))
    }

    /// Inserts `hook` keeping the chain sorted by descending priority.
    pub(crate) fn register(&self, hook: Hook<T>, priority: Priority) {
        self.chain
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hook, priority);
    }

    /// Removes the hook with identity `id` from the chain.
    pub(crate) fn remove(&self, id: HookId) -> AppResult<()> {
        self.chain
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::contract("Trying to remove an unregistered hook"))
    }

    /// Binds this listener to a manager's dispatch gate.
    ///
    /// Returns `false` if it is already bound to a different gate.
    pub(crate) fn attach(&self, gate: &DispatchGate) -> bool {
        let bound = self.gate.get_or_init(|| Arc::clone(gate));
        Arc::ptr_eq(bound, gate)
    }

    fn chain(&self) -> RwLockReadGuard<'_, HookChain<T>> {
        self.chain.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> fmt::Debug for HookListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookListener")
            .field("state", &std::any::type_name::<T>())
            .field("hooks", &self.len())
            .field("critical", &self.critical)
            .finish()
    }
}
