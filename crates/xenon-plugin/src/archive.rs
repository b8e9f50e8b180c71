//! Plugin archive access.
//!
//! Archives are zip files; entries are addressed with
//! [`ARCHIVE_SEPARATOR`](crate::plugin::ARCHIVE_SEPARATOR)-separated paths.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use xenon_core::error::{AppError, ErrorKind};
use xenon_core::result::AppResult;

/// Upper bound on the buffer reserved up front from an entry's declared size.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// Returns whether `path` names a regular file with the archive extension.
pub fn is_archive(path: &Path, extension: &str) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&format!(".{extension}")))
}

/// Reads one entry of `archive` in full.
pub fn read_entry(archive: &Path, entry: &str) -> AppResult<Vec<u8>> {
    let file = File::open(archive).map_err(|e| {
        AppError::with_source(
            ErrorKind::Archive,
            format!("Cannot open plugin archive '{}'", archive.display()),
            e,
        )
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| {
        AppError::with_source(
            ErrorKind::Archive,
            format!("'{}' is not a readable archive", archive.display()),
            e,
        )
    })?;
    let mut zip_file = zip.by_name(entry).map_err(|e| {
        AppError::with_source(
            ErrorKind::Archive,
            format!("Archive '{}' has no entry '{}'", archive.display(), entry),
            e,
        )
    })?;

    let mut buffer = Vec::with_capacity(capacity_hint(zip_file.size()));
    zip_file.read_to_end(&mut buffer).map_err(|e| {
        AppError::with_source(
            ErrorKind::Archive,
            format!(
                "Failed to read entry '{}' of archive '{}'",
                entry,
                archive.display()
            ),
            e,
        )
    })?;
    Ok(buffer)
}

/// Initial capacity for an entry declaring `size` uncompressed bytes.
fn capacity_hint(size: u64) -> usize {
    usize::try_from(size.min(MAX_PREALLOCATION)).unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::test_support::write_archive;
    use super::*;

    #[test]
    fn test_read_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_archive(dir.path(), "a.xpl", &[("net/demo/Main.so", "\x7fELF")]);

        assert_eq!(read_entry(&path, "net/demo/Main.so").unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(4096), 4096);
        assert_eq!(capacity_hint(u64::MAX), 1 << 20);
    }

    #[test]
    fn test_read_entry_larger_than_preallocation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = "x".repeat((1 << 20) + 17);
        let path = write_archive(dir.path(), "big.xpl", &[("blob", payload.as_str())]);

        assert_eq!(read_entry(&path, "blob").unwrap().len(), payload.len());
    }

    #[test]
    fn test_missing_entry_is_archive_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_archive(dir.path(), "a.xpl", &[("other", "x")]);

        let err = read_entry(&path, "net/demo/Main.so").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Archive);
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.xpl");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let err = read_entry(&path, "anything").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Archive);
    }

    #[test]
    fn test_is_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = write_archive(dir.path(), "a.xpl", &[("x", "x")]);
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        std::fs::create_dir(dir.path().join("folder.xpl")).unwrap();

        assert!(is_archive(&archive, "xpl"));
        assert!(!is_archive(&text, "xpl"));
        assert!(!is_archive(&dir.path().join("folder.xpl"), "xpl"));
    }
}
