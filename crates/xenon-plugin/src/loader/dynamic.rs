//! Dynamic plugin loader using `libloading` (feature-gated).

#[cfg(feature = "dynamic")]
mod imp {
    use std::fmt;
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;
    use tracing::{debug, info};

    use xenon_core::error::{AppError, ErrorKind};
    use xenon_core::result::AppResult;

    use crate::archive;
    use crate::loader::{ENTRY_SYMBOL, EntryPoint, IsolatedLoader, LoaderFactory};
    use crate::plugin::Plugin;

    /// Loads entry points from shared libraries stored inside plugin archives.
    #[derive(Debug, Default, Clone)]
    pub struct DynamicLoaderFactory {
        /// Where libraries are extracted; the system temp dir when unset.
        extract_dir: Option<PathBuf>,
    }

    impl DynamicLoaderFactory {
        /// Creates the factory.
        pub fn new() -> Self {
            Self::default()
        }

        /// Extracts plugin libraries into `dir` instead of the system temp
        /// directory.
        pub fn with_extract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.extract_dir = Some(dir.into());
            self
        }
    }

    impl LoaderFactory for DynamicLoaderFactory {
        fn isolate(&self, plugin: &Plugin) -> AppResult<Box<dyn IsolatedLoader>> {
            Ok(Box::new(DynamicLoader {
                plugin: plugin.clone(),
                extract_dir: self.extract_dir.clone(),
                library: None,
                file: None,
            }))
        }
    }

    /// One plugin's shared library, extracted to a private temporary file.
    ///
    /// Field order matters: the library is unloaded before its backing file
    /// is deleted.
    pub struct DynamicLoader {
        plugin: Plugin,
        extract_dir: Option<PathBuf>,
        library: Option<libloading::Library>,
        file: Option<NamedTempFile>,
    }

    impl DynamicLoader {
        fn extract(&self) -> AppResult<NamedTempFile> {
            let bytes = archive::read_entry(self.plugin.path(), self.plugin.entry_path())?;
            let suffix = format!(".{}", std::env::consts::DLL_EXTENSION);
            let mut builder = tempfile::Builder::new();
            builder.prefix("xenon-plugin-").suffix(&suffix);
            let mut file = match self.extract_dir.as_deref() {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        }
    }

    impl IsolatedLoader for DynamicLoader {
        fn plugin(&self) -> &Plugin {
            &self.plugin
        }

        fn load_entry_point(&mut self) -> AppResult<EntryPoint> {
            if self.library.is_none() {
                let file = self.extract()?;
                // SAFETY: plugin archives are trusted; their initializers run here.
                let library = unsafe { libloading::Library::new(file.path()) }.map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Plugin,
                        format!(
                            "Failed to load library of plugin '{}'",
                            self.plugin.name()
                        ),
                        e,
                    )
                })?;
                info!(
                    plugin = %self.plugin.name(),
                    library = %file.path().display(),
                    "Plugin library loaded"
                );
                self.file = Some(file);
                self.library = Some(library);
            }

            let library = self
                .library
                .as_ref()
                .ok_or_else(|| AppError::internal("Plugin library vanished"))?;

            // SAFETY: the symbol is declared with the `EntryPoint` signature by
            // `entry_point!`; the pointer is only used while `library` lives.
            let symbol = unsafe { library.get::<EntryPoint>(ENTRY_SYMBOL.as_bytes()) }.map_err(
                |e| {
                    AppError::plugin(format!(
                        "Plugin '{}' missing '{ENTRY_SYMBOL}' symbol: {e}",
                        self.plugin.name()
                    ))
                },
            )?;
            Ok(*symbol)
        }
    }

    impl Drop for DynamicLoader {
        fn drop(&mut self) {
            if self.library.is_some() {
                debug!(plugin = %self.plugin.name(), "Unloading plugin library");
            }
        }
    }

    impl fmt::Debug for DynamicLoader {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("DynamicLoader")
                .field("plugin", &self.plugin.name())
                .field("loaded", &self.library.is_some())
                .finish()
        }
    }
}

/// Stub factory when the dynamic feature is not enabled.
#[cfg(not(feature = "dynamic"))]
mod imp {
    use xenon_core::error::AppError;
    use xenon_core::result::AppResult;

    use crate::loader::{IsolatedLoader, LoaderFactory};
    use crate::plugin::Plugin;

    /// Stub factory that refuses every plugin.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DynamicLoaderFactory;

    impl DynamicLoaderFactory {
        /// Creates the stub factory.
        pub fn new() -> Self {
            Self
        }
    }

    impl LoaderFactory for DynamicLoaderFactory {
        fn isolate(&self, plugin: &Plugin) -> AppResult<Box<dyn IsolatedLoader>> {
            Err(AppError::plugin(format!(
                "Cannot load plugin '{}': built without the 'dynamic' feature",
                plugin.name()
            )))
        }
    }
}

pub use imp::DynamicLoaderFactory;
