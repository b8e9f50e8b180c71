//! Plugin system configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Directory scanned (non-recursively) for plugin archives.
    #[serde(default = "default_plugin_directory")]
    pub directory: PathBuf,
    /// File extension identifying plugin archives, without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Whether to load every scanned plugin on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Plugin names excluded from the desired set.
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Period between directory rescans. No rescans when unset.
    #[serde(default)]
    pub rescan_interval_seconds: Option<u64>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            extension: default_extension(),
            auto_load: true,
            disabled: Vec::new(),
            rescan_interval_seconds: None,
        }
    }
}

impl PluginConfig {
    /// Returns whether the plugin with the given name is disabled.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d == name)
    }
}

fn default_plugin_directory() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_extension() -> String {
    "xpl".to_string()
}

fn default_true() -> bool {
    true
}
