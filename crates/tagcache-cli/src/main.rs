//! tagcache - track game-entity tags per scope and serve cached profiles.
//!
//! This binary drives the snapshot store from the command line: registering
//! tags, fetching profiles with a cached fallback, and running the periodic
//! refresh loop.

mod commands;
mod render;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tagcache_core::config::Config;

use commands::{Command, USAGE};

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "tagcache.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and also to a daily rolling file when a log directory
/// is configured. The returned guard must be held until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let mut config = Config::load()?;
    config.apply_env();

    let guard = init_tracing(config.log_dir.as_deref());
    info!("tagcache starting");

    if let Err(e) = commands::run(command, config).await {
        eprintln!("Error: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
