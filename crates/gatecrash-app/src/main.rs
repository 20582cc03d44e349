//! Gatecrash - paywall bypass daemon.
//!
//! Runs the background engine behind the HTTP messaging bridge:
//! - Loads persisted settings and the bundled site registry
//! - Installs the header rewrite rules for the current settings
//! - Serves the bridge API for popup and page surfaces

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gatecrash_server::{AppState, Server, ServerConfig, DEFAULT_PORT};
use gatecrash_storage::{JsonFileStore, KvStore, MemoryStore};

/// Gatecrash - paywall bypass daemon
#[derive(Parser, Debug)]
#[command(name = "gatecrash", version, about)]
struct Args {
    /// Port for the bridge API
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Data directory (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep all state in memory, writing nothing to disk
    #[arg(long)]
    ephemeral: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("io", "gatecrash", "gatecrash").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with daily file rotation plus console output.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatecrash={},warn", log_level)));

    if !args.ephemeral {
        if let Some(log_dir) = logs_dir() {
            if std::fs::create_dir_all(&log_dir).is_ok() {
                let file_appender = RollingFileAppender::builder()
                    .rotation(Rotation::DAILY)
                    .max_log_files(5)
                    .filename_prefix("gatecrash")
                    .filename_suffix("log")
                    .build(&log_dir)
                    .ok();

                if let Some(appender) = file_appender {
                    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                    tracing::info!("Logging to {:?}", log_dir);
                    return Some(guard);
                }
            }
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    let store: Arc<dyn KvStore> = if args.ephemeral {
        tracing::info!("Running ephemeral, nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        let dir = match args.data_dir.clone() {
            Some(dir) => dir,
            None => gatecrash_storage::default_data_dir()
                .context("no usable data directory, pass --data-dir or --ephemeral")?,
        };
        tracing::info!("Data directory: {:?}", dir);
        Arc::new(JsonFileStore::open(&dir).context("opening settings store")?)
    };

    let state = AppState::new(store).context("installing initial header rules")?;
    tracing::info!(
        enabled = state.config.enabled(),
        custom_sites = state.config.custom_sites().len(),
        rules = state.installed_rules().len(),
        "Engine ready"
    );

    let config = ServerConfig::default().with_port(args.port);
    let server = Server::with_state(config, state).context("building bridge server")?;
    tracing::info!("Bridge listening on {}", server.addr());

    server.run().await.context("bridge server exited")?;
    Ok(())
}
