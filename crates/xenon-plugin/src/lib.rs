//! # xenon-plugin
//!
//! Plugin framework for the Xenon host. Provides:
//!
//! - Priority-ordered hook listeners, one per extension point
//! - Discovery of plugin archives and their manifests
//! - Per-plugin isolated loaders (compiled-in or `dynamic` shared libraries)
//! - The plugin manager: load, unload and reconciliation of the loaded set

pub mod archive;
pub mod builder;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod manifest;
pub mod plugin;
pub mod prelude;
pub mod scanner;

pub use builder::{HookBinding, PluginBuilder};
pub use hooks::{ExtensionPoint, Hook, HookId, HookListener, Priority};
pub use loader::{
    DynamicLoaderFactory, ENTRY_SYMBOL, EntryPoint, IsolatedLoader, LoaderFactory,
    StaticLoaderFactory,
};
pub use manager::{PluginManager, ReconcileReport};
pub use manifest::{Manifest, ManifestReader, ZipManifestReader};
pub use plugin::{Plugin, PluginInfo};
pub use xenon_core::{AppError, AppResult, ErrorKind};
