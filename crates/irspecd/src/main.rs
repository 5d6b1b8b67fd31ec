//! irspecd - IR Spectroscopy Control Daemon
//!
//! Serves the hardware modules found under the modules root, plus the
//! built frontend, over HTTP.
//!
//! Usage:
//!   irspecd [OPTIONS] [hardware_configuration.toml]
//!
//! A missing or malformed configuration file is logged and replaced by the
//! built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use irspec_api::{build_app, HardwareConfig, ModuleContext, DEFAULT_CONFIG_PATH};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Hardware configuration file (TOML)
    config_path: PathBuf,
    modules_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        modules_dir: None,
        static_dir: None,
        host: None,
        port: None,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--modules-dir" | "-m" => match value {
                Some(v) => {
                    result.modules_dir = Some(PathBuf::from(v));
                    i += 2;
                }
                None => {
                    tracing::error!("Missing argument for --modules-dir");
                    i += 1;
                }
            },
            "--static-dir" | "-s" => match value {
                Some(v) => {
                    result.static_dir = Some(PathBuf::from(v));
                    i += 2;
                }
                None => {
                    tracing::error!("Missing argument for --static-dir");
                    i += 1;
                }
            },
            "--host" => match value {
                Some(v) => {
                    result.host = Some(v);
                    i += 2;
                }
                None => {
                    tracing::error!("Missing argument for --host");
                    i += 1;
                }
            },
            "--port" | "-p" => {
                match value.as_deref().map(str::parse::<u16>) {
                    Some(Ok(port)) => result.port = Some(port),
                    Some(Err(_)) => tracing::error!("Invalid port: {}", value.unwrap_or_default()),
                    None => tracing::error!("Missing argument for --port"),
                }
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = PathBuf::from(arg);
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"irspecd - IR Spectroscopy Control Daemon

Usage: irspecd [OPTIONS] [hardware_configuration.toml]

Options:
  -m, --modules-dir <path>  Hardware modules root (default: modules)
  -s, --static-dir <path>   Built frontend directory (default: static)
      --host <addr>         Listen address (default: 0.0.0.0)
  -p, --port <port>         Listen port (default: 8000)
  -h, --help                Print this help message

Examples:
  # Run with ./hardware_configuration.toml
  irspecd

  # Run against a bench configuration on another port
  irspecd --port 8080 bench.toml
"#
    );
}

/// Resolves on Ctrl+C and cancels every running hardware operation
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "irspecd=info,irspec_api=info,irspec_serial=info,irspec_mircat=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting irspecd (IR Spectroscopy Control Daemon)");

    let args = parse_args();

    let mut config = HardwareConfig::load_or_default(&args.config_path);
    if let Some(dir) = args.modules_dir {
        config.server.modules_dir = dir;
    }
    if let Some(dir) = args.static_dir {
        config.server.static_dir = dir;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ctx = ModuleContext::new(Arc::new(config));
    let app = build_app(&ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ctx.shutdown.clone()))
        .await?;

    Ok(())
}
