//! deck-telemetry - run a telemetry producer and expose its dataset
//!
//! Supervises the configured producer command, keeps the shared dataset up
//! to date and optionally logs changes to a set of watched keys.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deck_telemetry::config::AppConfig;
use deck_telemetry::consumer::Watcher;
use deck_telemetry::supervisor::{Supervisor, SupervisorState};
use deck_telemetry::telemetry::TelemetryHandle;

/// Deck Telemetry - supervised telemetry feed for control-surface widgets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Producer command, overrides telemetry.command from the config file
    #[arg(long, env = "TELEMETRY_COMMAND")]
    command: Option<String>,

    /// Telemetry keys to log when they change (adds to watch.keys)
    #[arg(short, long = "watch", value_delimiter = ',')]
    watch: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.log_format)?;

    info!("Starting deck-telemetry...");
    info!("Configuration file: {}", args.config);

    // The config file is optional when the command comes from the CLI
    let config = if args.command.is_some() {
        AppConfig::load_or_default(&args.config).await?
    } else {
        AppConfig::load(&args.config).await?
    };
    let command = config.resolve_command(args.command.as_deref())?;
    let policy = config.telemetry.restart_policy();

    let store = TelemetryHandle::spawn();

    let mut watch_keys: Vec<String> = config
        .watch
        .as_ref()
        .map(|w| w.keys.clone())
        .unwrap_or_default();
    watch_keys.extend(args.watch.iter().cloned());
    watch_keys.sort();
    watch_keys.dedup();

    let watcher = if watch_keys.is_empty() {
        None
    } else {
        let interval = config.watch.clone().unwrap_or_default().poll_interval();
        info!(keys = ?watch_keys, "Watching telemetry keys");
        Some(tokio::spawn(
            Watcher::new(store.clone(), watch_keys, interval).run(),
        ))
    };

    info!(
        min_uptime_secs = policy.min_uptime.as_secs(),
        "Supervising telemetry command"
    );
    let supervisor = Supervisor::new(command, policy, store.clone());
    let mut status_rx = supervisor.subscribe();
    let handle = supervisor.spawn();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut supervising = true;
    loop {
        tokio::select! {
            changed = status_rx.changed(), if supervising => {
                if changed.is_err() {
                    // Supervisor task is gone; nothing left to watch
                    supervising = false;
                    continue;
                }
                let status = *status_rx.borrow_and_update();
                if status.state == SupervisorState::Stopped {
                    warn!(
                        spawns = status.spawns,
                        "Telemetry supervision stopped; dataset will no longer update"
                    );
                }
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    handle.abort();
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    store.shutdown();

    info!("deck-telemetry shutdown complete");
    Ok(())
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
