//! Hook callbacks contributed by plugins.

use std::fmt;
use std::sync::Arc;

/// Callback signature of a hook over the shared state `T`.
///
/// Returning `true` means the hook fully handled the state and propagation
/// stops.
pub type HookFn<T> = dyn Fn(&mut T) -> bool + Send + Sync;

/// Identity of a hook, stable for as long as any clone of the hook is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(usize);

/// A single callback registered against one extension point.
///
/// Clones share identity: registering a clone of an already registered hook
/// is registering the same hook twice.
pub struct Hook<T> {
    callback: Arc<HookFn<T>>,
}

impl<T> Hook<T> {
    /// Wraps a closure into a hook.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Returns the identity of this hook.
    pub fn id(&self) -> HookId {
        HookId(Arc::as_ptr(&self.callback) as *const () as usize)
    }

    /// Runs the hook against the shared state.
    pub fn call(&self, state: &mut T) -> bool {
        (self.callback)(state)
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> PartialEq for Hook<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T> Eq for Hook<T> {}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id())
            .field("callback", &"<closure>")
            .finish()
    }
}
