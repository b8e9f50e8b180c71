//! CLI command definitions and dispatch.

pub mod run;
pub mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use xenon_core::config::AppConfig;
use xenon_core::error::AppError;

/// Xenon — plugin host
#[derive(Debug, Parser)]
#[command(name = "xenon-host", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment; `config/<env>` overlays `config/default`
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Plugin directory, overriding the configuration
    #[arg(short = 'd', long)]
    pub plugin_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the plugins found in the plugin directory
    Scan(scan::ScanArgs),
    /// Load plugins and keep them in sync with the plugin directory
    Run(run::RunArgs),
}

impl Cli {
    /// Load configuration for the selected environment and apply overrides
    pub fn load_configuration(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(&self.env)?;
        if let Some(dir) = &self.plugin_dir {
            config.plugins.directory = dir.clone();
        }
        Ok(config)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Scan(args) => scan::execute(args, &config),
            Commands::Run(args) => run::execute(args, config).await,
        }
    }
}
