//! Isolated plugin loaders.
//!
//! Every loaded plugin owns exactly one [`IsolatedLoader`]. The loader reads
//! the entry-point library from the plugin archive and defines the entry
//! point; dropping it releases everything the plugin's code brought in.
//! The manager removes a plugin's hooks from every listener before it drops
//! the loader.

pub mod dynamic;
pub mod static_loader;

use std::fmt;

use xenon_core::result::AppResult;

use crate::builder::PluginBuilder;
use crate::plugin::Plugin;

pub use dynamic::DynamicLoaderFactory;
pub use static_loader::StaticLoaderFactory;

/// Signature of a plugin entry point.
///
/// The entry point registers its hooks through the builder and must not do
/// anything else with the host.
pub type EntryPoint = fn(&mut PluginBuilder<'_>) -> AppResult<()>;

/// Symbol dynamic plugins export their [`EntryPoint`] under.
pub const ENTRY_SYMBOL: &str = "xenon_plugin_main";

/// Loading context private to one plugin.
pub trait IsolatedLoader: Send + fmt::Debug {
    /// The plugin this loader serves.
    fn plugin(&self) -> &Plugin;

    /// Reads the entry-point library from the archive and defines the entry
    /// point.
    fn load_entry_point(&mut self) -> AppResult<EntryPoint>;
}

/// Creates one isolated loader per plugin.
pub trait LoaderFactory: Send + Sync + fmt::Debug {
    /// Creates a fresh loader scoped to `plugin`.
    fn isolate(&self, plugin: &Plugin) -> AppResult<Box<dyn IsolatedLoader>>;
}
