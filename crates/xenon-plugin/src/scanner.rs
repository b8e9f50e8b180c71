//! Plugin discovery: turns a directory of archives into plugin descriptors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use xenon_core::error::{AppError, ErrorKind};
use xenon_core::result::AppResult;

use crate::archive;
use crate::manifest::ManifestReader;
use crate::plugin::{ARCHIVE_SEPARATOR, Plugin};

/// An archive whose manifest declared both required hints.
///
/// Holding the parsed fields keeps the manifest from being read twice: once
/// to decide whether the archive is a plugin and once to build it.
#[derive(Debug)]
struct PluginCandidate {
    path: PathBuf,
    name: String,
    separator: &'static str,
    main_class: String,
    logo_path: Option<String>,
}

impl PluginCandidate {
    /// Reads the manifest of `path`, returning `None` when the archive is
    /// unreadable or not a plugin.
    fn read(path: &Path, reader: &dyn ManifestReader) -> Option<Self> {
        let manifest = match reader.read_manifest(path) {
            Ok(m) => m,
            Err(e) => {
                debug!(archive = %path.display(), error = %e, "Skipping unreadable archive");
                return None;
            }
        };

        match (manifest.main_class, manifest.name) {
            (Some(main_class), Some(name)) => {
                debug!(
                    archive = %path.display(),
                    name = %name,
                    logo = ?manifest.logo,
                    "Scanned the plugin"
                );
                Some(Self {
                    path: path.to_path_buf(),
                    name,
                    separator: ARCHIVE_SEPARATOR,
                    main_class,
                    logo_path: manifest.logo,
                })
            }
            _ => {
                debug!(archive = %path.display(), "Archive manifest lacks plugin hints");
                None
            }
        }
    }

    /// Materializes the plugin descriptor. A logo that cannot be read is
    /// dropped silently.
    fn build(self, reader: &dyn ManifestReader) -> Option<Plugin> {
        let logo = self.logo_path.as_deref().and_then(|entry| {
            match reader.read_entry(&self.path, entry) {
                Ok(bytes) if !bytes.is_empty() => Some(Bytes::from(bytes)),
                Ok(_) => None,
                Err(e) => {
                    debug!(archive = %self.path.display(), error = %e, "Ignoring plugin logo");
                    None
                }
            }
        });

        match Plugin::wrap(self.path, self.name, self.separator, self.main_class, logo) {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                debug!(error = %e, "Discarding invalid plugin candidate");
                None
            }
        }
    }
}

/// Lists `directory` (non-recursively) and returns every archive with the
/// given extension that declares a plugin.
///
/// Archives without the required manifest hints are excluded; only a
/// directory that cannot be listed is an error.
pub fn scan_directory(
    directory: &Path,
    extension: &str,
    reader: &dyn ManifestReader,
) -> AppResult<HashSet<Plugin>> {
    let entries = std::fs::read_dir(directory).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Cannot list plugin directory '{}'", directory.display()),
            e,
        )
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| archive::is_archive(path, extension))
        .collect();
    paths.sort();

    let plugins: HashSet<Plugin> = paths
        .iter()
        .filter_map(|path| PluginCandidate::read(path, reader))
        .filter_map(|candidate| candidate.build(reader))
        .collect();

    info!(
        directory = %directory.display(),
        archives = paths.len(),
        plugins = plugins.len(),
        "Plugin scan complete"
    );

    Ok(plugins)
}
