//! `scan` command.

use clap::Args;

use xenon_core::config::AppConfig;
use xenon_core::result::AppResult;
use xenon_plugin::{DynamicLoaderFactory, PluginManager};

use crate::output::{self, OutputFormat};

/// Arguments of `scan`
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Scan the plugin directory and print what was found
pub fn execute(args: &ScanArgs, config: &AppConfig) -> AppResult<()> {
    let manager = PluginManager::new(&config.plugins, DynamicLoaderFactory::new());
    manager.scan_for_plugins()?;
    output::print_plugins(&manager.plugins(), args.format)
}
