//! Loader for entry points compiled into the host.
//!
//! The archive still has to carry the entry-point entry: its bytes are read
//! and retained exactly as the dynamic loader does, only the code that runs
//! comes from the host's own table.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use super::{EntryPoint, IsolatedLoader, LoaderFactory};
use crate::archive;
use crate::plugin::Plugin;

/// Resolves entry points by their dotted name from a host-side table.
#[derive(Debug, Default, Clone)]
pub struct StaticLoaderFactory {
    entry_points: HashMap<String, EntryPoint>,
}

impl StaticLoaderFactory {
    /// Creates a factory with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry point under its dotted name.
    pub fn with_entry_point(mut self, name: impl Into<String>, entry_point: EntryPoint) -> Self {
        self.entry_points.insert(name.into(), entry_point);
        self
    }
}

impl LoaderFactory for StaticLoaderFactory {
    fn isolate(&self, plugin: &Plugin) -> AppResult<Box<dyn IsolatedLoader>> {
        Ok(Box::new(StaticLoader {
            plugin: plugin.clone(),
            entry_point: self.entry_points.get(plugin.entry_point()).copied(),
            defined: None,
        }))
    }
}

/// Isolated loader backed by a compiled-in entry point.
#[derive(Debug)]
pub struct StaticLoader {
    plugin: Plugin,
    entry_point: Option<EntryPoint>,
    /// Entry-point bytes read from the archive.
    defined: Option<Bytes>,
}

impl IsolatedLoader for StaticLoader {
    fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    fn load_entry_point(&mut self) -> AppResult<EntryPoint> {
        if self.defined.is_none() {
            let bytes = archive::read_entry(self.plugin.path(), self.plugin.entry_path())?;
            debug!(
                plugin = %self.plugin.name(),
                entry = %self.plugin.entry_path(),
                bytes = bytes.len(),
                "Entry point defined"
            );
            self.defined = Some(Bytes::from(bytes));
        }

        self.entry_point.ok_or_else(|| {
            AppError::plugin(format!(
                "Entry point '{}' of plugin '{}' not found",
                self.plugin.entry_point(),
                self.plugin.name()
            ))
        })
    }
}
