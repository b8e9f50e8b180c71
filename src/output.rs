//! Text and JSON output for CLI commands.

use xenon_core::result::AppResult;
use xenon_plugin::PluginInfo;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Print plugin snapshots in the selected format
pub fn print_plugins(plugins: &[PluginInfo], format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Text => {
            if plugins.is_empty() {
                println!("No plugins found.");
            }
            for plugin in plugins {
                let status = if plugin.loaded { "loaded" } else { "available" };
                println!(
                    "{:<24} {:<10} {:<32} {}",
                    plugin.name, status, plugin.entry_point, plugin.path
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(plugins)?);
        }
    }
    Ok(())
}
