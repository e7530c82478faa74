//! Instanti8 Server - Entry Point
//!
//! Chat-driven Infrastructure-as-Code backend: accepts Terraform/Pulumi
//! submissions over REST, orchestrates toolchain or Azure deployments, and
//! answers a WebSocket chat channel.

use std::collections::HashMap;
use std::env;

use instanti8_server::config::Settings;
use instanti8_server::logs::{init_logging, LogOptions};
use instanti8_server::server::serve::serve;
use instanti8_server::server::state::ServerState;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // Load settings from the environment
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            println!("Invalid configuration: {e}");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Wire up services and run the server
    let state = match ServerState::build(&settings) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize services: {e}");
            return;
        }
    };

    info!(
        "Running Instanti8 server on {}:{}",
        settings.host, settings.port
    );

    let handle = match serve(&settings, state, await_shutdown_signal()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start the server: {e}");
            return;
        }
    };

    match handle.await {
        Ok(Ok(())) => info!("Server stopped"),
        Ok(Err(e)) => error!("Server exited with error: {e}"),
        Err(e) => error!("Server task panicked: {e}"),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("signal handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("signal handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
