//! Plugin descriptor: the immutable identity of a discovered plugin.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

/// Path separator used inside plugin archives.
pub const ARCHIVE_SEPARATOR: &str = "/";

/// A discovered plugin archive.
///
/// Equality and hashing use the plugin name only: two archives declaring
/// the same name are the same plugin to every registry.
#[derive(Clone)]
pub struct Plugin {
    /// Location of the archive on disk.
    path: PathBuf,
    /// Declared plugin name.
    name: String,
    /// Dotted entry-point name (`net.demo.Main`).
    entry_point: String,
    /// Archive-internal path of the entry-point library.
    entry_path: String,
    /// Optional logo image read from the archive.
    logo: Option<Bytes>,
    /// Precomputed hash of `name`.
    hash: u64,
}

impl Plugin {
    /// Creates a plugin descriptor, deriving the entry-point path from
    /// `entry_point` and the archive `separator`.
    pub fn wrap(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        separator: &str,
        entry_point: impl Into<String>,
        logo: Option<Bytes>,
    ) -> AppResult<Self> {
        let name = name.into();
        let entry_point = entry_point.into();
        if name.trim().is_empty() {
            return Err(AppError::validation("Plugin name must not be empty"));
        }
        if entry_point.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Plugin '{name}' has an empty entry point"
            )));
        }

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);

        Ok(Self {
            path: path.into(),
            entry_path: Self::entry_path_for(&entry_point, separator),
            name,
            entry_point,
            logo,
            hash: hasher.finish(),
        })
    }

    /// Archive-internal path of the library defining `entry_point`:
    /// `net.demo.Main` becomes `net/demo/Main.so` on Linux.
    pub fn entry_path_for(entry_point: &str, separator: &str) -> String {
        format!(
            "{}.{}",
            entry_point.replace('.', separator),
            std::env::consts::DLL_EXTENSION
        )
    }

    /// Location of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted entry-point name.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Archive-internal path of the entry-point library.
    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    /// Logo bytes, if the archive provided a readable one.
    pub fn logo(&self) -> Option<&Bytes> {
        self.logo.as_ref()
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Plugin {}

impl Hash for Plugin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("entry_point", &self.entry_point)
            .field("logo_bytes", &self.logo.as_ref().map(Bytes::len))
            .finish()
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Serializable snapshot of a plugin and its load status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Declared plugin name.
    pub name: String,
    /// Archive location.
    pub path: String,
    /// Dotted entry-point name.
    pub entry_point: String,
    /// Whether the archive provided a logo.
    pub has_logo: bool,
    /// Whether the plugin is currently loaded.
    pub loaded: bool,
    /// Extension points the plugin registered hooks on.
    pub extension_points: Vec<String>,
    /// When the plugin was loaded.
    pub loaded_at: Option<DateTime<Utc>>,
}

impl PluginInfo {
    /// Snapshot of a plugin that is not loaded.
    pub fn unloaded(plugin: &Plugin) -> Self {
        Self {
            name: plugin.name.clone(),
            path: plugin.path.display().to_string(),
            entry_point: plugin.entry_point.clone(),
            has_logo: plugin.logo.is_some(),
            loaded: false,
            extension_points: Vec::new(),
            loaded_at: None,
        }
    }
}
