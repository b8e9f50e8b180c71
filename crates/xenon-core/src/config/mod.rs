//! Host configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::plugin::PluginConfig;

use crate::error::AppError;

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "XENON";

/// Root host configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Plugin system settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `XENON__`
    /// (`XENON__PLUGINS__DIRECTORY=/opt/plugins`). Missing files are not an
    /// error; every field has a default.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.plugins.directory, PathBuf::from("plugins"));
        assert_eq!(config.plugins.extension, "xpl");
        assert!(config.plugins.auto_load);
        assert!(config.plugins.disabled.is_empty());
        assert_eq!(config.plugins.rescan_interval_seconds, None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            [plugins]
            directory = "/opt/xenon/plugins"
            disabled = ["noisy"]
            rescan_interval_seconds = 5

            [logging]
            level = "debug"
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.plugins.directory, PathBuf::from("/opt/xenon/plugins"));
        assert_eq!(config.plugins.extension, "xpl");
        assert!(config.plugins.is_disabled("noisy"));
        assert!(!config.plugins.is_disabled("quiet"));
        assert_eq!(config.plugins.rescan_interval_seconds, Some(5));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_from_toml_empty_document() {
        let config = AppConfig::from_toml("").expect("empty toml");
        assert_eq!(config.plugins.directory, PathBuf::from("plugins"));
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let err = AppConfig::from_toml("[plugins]\nauto_load = \"sometimes\"").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
