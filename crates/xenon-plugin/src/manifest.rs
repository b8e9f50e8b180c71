//! Plugin manifest reading.
//!
//! Every plugin archive carries `META-INF/MANIFEST.MF`, a list of
//! `Key: Value` lines. Only three keys matter to the host:
//!
//! | Key | Meaning |
//! |---|---|
//! | `Main-Class` | dotted entry-point name (required) |
//! | `XePlugin-Name` | plugin name (required) |
//! | `XePlugin-Logo` | archive path of a logo image (optional) |

use std::fmt;
use std::path::Path;

use xenon_core::error::AppError;
use xenon_core::result::AppResult;

use crate::archive;

/// Archive path of the manifest.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
/// Manifest key naming the entry point.
pub const MAIN_CLASS_HINT: &str = "Main-Class";
/// Manifest key naming the plugin.
pub const PLUGIN_NAME_HINT: &str = "XePlugin-Name";
/// Manifest key naming the logo entry.
pub const PLUGIN_LOGO_HINT: &str = "XePlugin-Logo";

/// The manifest fields the host cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Dotted entry-point name.
    pub main_class: Option<String>,
    /// Plugin name.
    pub name: Option<String>,
    /// Archive path of the logo.
    pub logo: Option<String>,
}

impl Manifest {
    /// Parses manifest text. Unknown keys and malformed lines are ignored.
    pub fn parse(text: &str) -> Self {
        let mut manifest = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                MAIN_CLASS_HINT => manifest.main_class = Some(value.to_string()),
                PLUGIN_NAME_HINT => manifest.name = Some(value.to_string()),
                PLUGIN_LOGO_HINT => manifest.logo = Some(value.to_string()),
                _ => {}
            }
        }
        manifest
    }
}

/// Reads manifests and entries out of plugin archives.
pub trait ManifestReader: Send + Sync + fmt::Debug {
    /// Reads and parses the manifest of `archive`.
    fn read_manifest(&self, archive: &Path) -> AppResult<Manifest>;

    /// Reads one archive entry in full.
    fn read_entry(&self, archive: &Path, entry: &str) -> AppResult<Vec<u8>>;
}

/// Reads manifests from zip archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipManifestReader;

impl ManifestReader for ZipManifestReader {
    fn read_manifest(&self, archive: &Path) -> AppResult<Manifest> {
        let bytes = archive::read_entry(archive, MANIFEST_PATH)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::manifest(format!(
                "Manifest of '{}' is not valid UTF-8: {e}",
                archive.display()
            ))
        })?;
        Ok(Manifest::parse(&text))
    }

    fn read_entry(&self, archive: &Path, entry: &str) -> AppResult<Vec<u8>> {
        archive::read_entry(archive, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_archive;

    #[test]
    fn test_parse_all_fields() {
        let manifest = Manifest::parse(
            "Manifest-Version: 1.0\r\nMain-Class: net.demo.Main\r\nXePlugin-Name:  Greeter \r\nXePlugin-Logo: assets/logo.png\r\n",
        );
        assert_eq!(manifest.main_class.as_deref(), Some("net.demo.Main"));
        assert_eq!(manifest.name.as_deref(), Some("Greeter"));
        assert_eq!(manifest.logo.as_deref(), Some("assets/logo.png"));
    }

    #[test]
    fn test_missing_name_stays_unset() {
        let manifest = Manifest::parse("Main-Class: net.demo.Main\n");
        assert_eq!(manifest.main_class.as_deref(), Some("net.demo.Main"));
        assert_eq!(manifest.name, None);
    }

    #[test]
    fn test_blank_values_and_garbage_ignored() {
        let manifest = Manifest::parse("Main-Class:   \nthis line has no separator\nXePlugin-Name: x\n");
        assert_eq!(manifest.main_class, None);
        assert_eq!(manifest.name.as_deref(), Some("x"));
    }

    #[test]
    fn test_zip_reader() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_archive(
            dir.path(),
            "a.xpl",
            &[(
                MANIFEST_PATH,
                "Main-Class: net.demo.Main\nXePlugin-Name: Greeter\n",
            )],
        );

        let manifest = ZipManifestReader.read_manifest(&path).unwrap();
        assert_eq!(manifest.main_class.as_deref(), Some("net.demo.Main"));
        assert_eq!(manifest.name.as_deref(), Some("Greeter"));
    }

    #[test]
    fn test_zip_reader_without_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_archive(dir.path(), "a.xpl", &[("readme.txt", "hi")]);

        assert!(ZipManifestReader.read_manifest(&path).is_err());
    }
}
