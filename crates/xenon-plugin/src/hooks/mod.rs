//! Hook system: priorities, hooks, listeners and the listener registry.

pub mod hook;
pub mod listener;
pub mod priority;
pub mod registry;

pub use hook::{Hook, HookId};
pub use listener::HookListener;
pub use priority::Priority;
pub use registry::ExtensionPoint;
