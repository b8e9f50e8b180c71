//! `run` command.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use xenon_core::config::{AppConfig, PluginConfig};
use xenon_core::result::AppResult;
use xenon_host::{HostListeners, sync_plugins};
use xenon_plugin::{DynamicLoaderFactory, PluginManager};

/// Arguments of `run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stop right after startup instead of waiting for a shutdown signal
    #[arg(long)]
    pub once: bool,
}

/// Load plugins, dispatch startup, watch the plugin directory until shutdown
pub async fn execute(args: &RunArgs, config: AppConfig) -> AppResult<()> {
    info!("Starting Xenon host v{}", env!("CARGO_PKG_VERSION"));

    let manager = Arc::new(PluginManager::new(
        &config.plugins,
        DynamicLoaderFactory::new(),
    ));
    let listeners = HostListeners::register(&manager)?;

    // ── Initial load ─────────────────────────────────────────────
    sync_plugins(&manager, &config.plugins)?;

    let mut names: Vec<String> = manager
        .loaded_plugins()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    names.sort();
    listeners.startup.state().plugins = names;

    listeners.startup.dispatch();
    for message in &listeners.startup.state().messages {
        info!(message = %message, "Startup hook");
    }
    info!(
        plugins = manager.loaded_plugins().len(),
        directory = %manager.directory().display(),
        "Host started"
    );

    // ── Watch ────────────────────────────────────────────────────
    let reason = if args.once {
        "run --once"
    } else {
        match config.plugins.rescan_interval_seconds {
            Some(seconds) if seconds > 0 => {
                watch(manager.clone(), config.plugins.clone(), Duration::from_secs(seconds)).await;
            }
            _ => shutdown_signal().await,
        }
        "shutdown signal"
    };

    // ── Shutdown ─────────────────────────────────────────────────
    info!(reason, "Shutting down");
    listeners.shutdown.state().reason = reason.to_string();
    listeners.shutdown.dispatch();
    for message in &listeners.shutdown.state().messages {
        info!(message = %message, "Shutdown hook");
    }

    let report = manager.unload_all();
    for (plugin, e) in &report.failed {
        error!(plugin = %plugin.name(), error = %e, "Plugin failed to unload");
    }
    Ok(())
}

/// Rescan and reconcile every `period` until a shutdown signal arrives
async fn watch(manager: Arc<PluginManager>, config: PluginConfig, period: Duration) {
    info!(seconds = period.as_secs(), "Watching plugin directory");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load already ran.
    ticker.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let manager = manager.clone();
                let config = config.clone();
                match tokio::task::spawn_blocking(move || sync_plugins(&manager, &config)).await {
                    Ok(Ok(Some(report))) if !report.is_noop() => info!(
                        loaded = report.loaded.len(),
                        unloaded = report.unloaded.len(),
                        "Plugin directory changed"
                    ),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Plugin rescan failed"),
                    Err(e) => error!(error = %e, "Plugin rescan task failed"),
                }
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
