//! REST service binary.
//!
//! Loads configuration, installs logging, then hands control to the
//! lifecycle manager until a shutdown signal arrives.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use rest_template::config::{load_config, ServiceConfig};
use rest_template::lifecycle::{shutdown_signal, LifecycleManager};
use rest_template::observability::logging;
use rest_template::store::BackendConnector;
use rest_template::{api, version};

#[derive(Parser)]
#[command(name = "rest-template", about = "REST service template", disable_version_flag = true)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long = "conf", value_name = "PATH")]
    conf: Option<PathBuf>,

    /// Print version and revision, then exit.
    #[arg(short = 'V', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("rest-template {}", version::long_version());
        return ExitCode::SUCCESS;
    }

    let config = match &cli.conf {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => ServiceConfig::default(),
    };

    if let Err(err) = logging::init(&config.logging) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = version::VERSION,
        revision = version::REVISION,
        bind_address = %config.listener.bind_address,
        metrics_address = %config.metrics.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        "Configuration loaded"
    );

    let connector = BackendConnector::new(config.cache.clone(), config.database.clone());
    let manager = LifecycleManager::new(config);

    match manager.run(connector, api::routes, shutdown_signal()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Exiting after fatal error");
            ExitCode::FAILURE
        }
    }
}
