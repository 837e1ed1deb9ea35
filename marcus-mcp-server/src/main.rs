mod config;
mod setup;
mod stdio;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::{check_provider_reachable, initialize_app, spawn_background_loops};
use stdio::StdioMcpServer;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "marcus")]
#[command(about = "Coordinates autonomous coding agents against an external kanban board over MCP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (JSON). Falls back to the bundled default
    /// plus MARCUS_-prefixed environment overrides.
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Log level override (trace|debug|info|warn|error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("loading configuration from file: {}", path);
            Config::from_file(path)?
        }
        None => {
            info!("loading configuration from bundled default and environment");
            Config::from_env()?
        }
    };

    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:?}");
            std::process::exit(64);
        }
    };

    // Validated before telemetry comes up: a bad `logging.level` would
    // otherwise make `init_telemetry` itself fail, turning what should be a
    // clean exit-64 usage error into an unhandled startup panic.
    if let Err(e) = config.validate() {
        eprintln!("configuration validation failed: {e:?}");
        std::process::exit(64);
    }

    let _telemetry_guard = init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);
    log_startup_info(&config);

    let app = match initialize_app(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to initialize application");
            std::process::exit(70);
        }
    };

    if config.require_provider_on_start {
        if let Err(e) = check_provider_reachable(app.provider()).await {
            error!(error = %e, "board provider unreachable at startup");
            std::process::exit(69);
        }
    }

    let background_handles = spawn_background_loops(&app);

    info!("marcus coordinator ready, serving tool calls over stdio");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .expect("failed to register SIGINT handler");
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
            }
        }
        #[cfg(windows)]
        {
            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        let _ = shutdown_tx.send(());
    });

    let server = StdioMcpServer::new(app.dispatcher.clone());
    tokio::select! {
        result = server.serve() => {
            for handle in &background_handles {
                handle.abort();
            }
            match result {
                Ok(()) => {
                    info!("marcus shut down cleanly");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "stdio server error");
                    std::process::exit(3);
                }
            }
        }
        _ = shutdown_rx => {
            info!("shutdown signal received, stopping");
            for handle in &background_handles {
                handle.abort();
            }
            Ok(())
        }
    }
}
