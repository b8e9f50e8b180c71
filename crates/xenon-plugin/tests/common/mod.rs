//! Shared fixtures for plugin lifecycle tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use xenon_core::config::PluginConfig;
use xenon_plugin::manifest::MANIFEST_PATH;
use xenon_plugin::plugin::ARCHIVE_SEPARATOR;
use xenon_plugin::{LoaderFactory, Plugin, PluginManager};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Shared state of the critical extension point used by the tests.
#[derive(Debug, Default)]
pub struct Boot {
    pub log: Vec<String>,
}

/// Shared state of the non-critical extension point used by the tests.
#[derive(Debug, Default)]
pub struct Audit {
    pub log: Vec<String>,
}

/// Writes `<name>.xpl` declaring `name` with entry point `entry_point`.
/// The entry-point library entry is only written when `with_code` is set.
pub fn write_plugin(dir: &Path, name: &str, entry_point: &str, with_code: bool) -> PathBuf {
    write_plugin_with_code(dir, name, entry_point, with_code.then_some(b"compiled-in".as_slice()))
}

/// Writes `<name>.xpl` whose entry-point library entry holds `code`.
pub fn write_plugin_with_code(
    dir: &Path,
    name: &str,
    entry_point: &str,
    code: Option<&[u8]>,
) -> PathBuf {
    let path = dir.join(format!("{name}.xpl"));
    let file = std::fs::File::create(&path).expect("create archive");
    let mut zip = ZipWriter::new(file);

    zip.start_file(MANIFEST_PATH, SimpleFileOptions::default())
        .expect("start manifest");
    write!(zip, "Main-Class: {entry_point}\nXePlugin-Name: {name}\n").expect("write manifest");

    if let Some(code) = code {
        let entry = Plugin::entry_path_for(entry_point, ARCHIVE_SEPARATOR);
        zip.start_file(entry, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(code).expect("write entry");
    }

    zip.finish().expect("finish archive");
    path
}

/// A manager over `dir` loading plugins through `loaders`.
pub fn manager(dir: &Path, loaders: impl LoaderFactory + 'static) -> PluginManager {
    let config = PluginConfig {
        directory: dir.to_path_buf(),
        ..PluginConfig::default()
    };
    PluginManager::new(&config, loaders)
}

/// The scanned plugin called `name`.
pub fn scanned(manager: &PluginManager, name: &str) -> Plugin {
    manager
        .scanned_plugins()
        .expect("scanned")
        .into_iter()
        .find(|p| p.name() == name)
        .unwrap_or_else(|| panic!("plugin {name} not scanned"))
}
