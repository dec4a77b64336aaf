//! # LPWAN Tracker
//!
//! Runs the tracker scheduler on a host with simulated devices and an AT
//! console on stdin/stdout or a serial port.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use lpwan_tracker::config::{Config, LoggingConfig};
use lpwan_tracker::console::{self, Console};
use lpwan_tracker::events::EventBus;
use lpwan_tracker::scheduler::Scheduler;
use lpwan_tracker::sim;
use lpwan_tracker::storage::{FileFlagStorage, SettingsStore};
use lpwan_tracker::telemetry::UplinkJournal;

/// Config file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Set up console logging, plus daily rolling files when configured
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    // Diagnostics go to stderr, stdout carries the AT console
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    if config.log_dir.is_empty() {
        tracing_subscriber::registry().with(filter).with(stderr_layer).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, "lpwan-tracker.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

/// Main entry point
///
/// # Control Flow
///
/// 1. Load configuration (first argument, or `config/default.toml`)
/// 2. Set up logging and open the AT console
/// 3. Build the scheduler from persisted flags and simulated devices
/// 4. Run until Ctrl+C; a restart request rebuilds everything from the
///    persisted flags, as a reboot would
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        Config::default()
    };

    let _log_guard = init_logging(&config.logging)?;
    info!("LPWAN Tracker v{} starting...", env!("CARGO_PKG_VERSION"));
    if !config_path.exists() {
        warn!("{} not found, using built-in defaults", config_path.display());
    }

    let (sink, mut console_input) = if config.console.port.is_empty() {
        console::open_stdio()
    } else {
        console::open_serial(&config.console.port, config.console.baud_rate)?
    };
    let at_console: Arc<dyn Console> = sink;

    let mut boot: u32 = 0;
    loop {
        boot += 1;
        info!("Boot #{}", boot);

        let bus = Arc::new(EventBus::new());
        let store = SettingsStore::new(Box::new(FileFlagStorage::open(&config.storage.dir)?));
        let devices = sim::devices(&config.simulation, &bus);
        let _motion = sim::motion_source(&config.simulation, &bus);

        let mut scheduler =
            Scheduler::new(&config, devices, store, Arc::clone(&at_console), Arc::clone(&bus));
        if config.telemetry.enabled {
            scheduler = scheduler.with_journal(UplinkJournal::open(&config.telemetry)?);
        }
        scheduler.start();
        info!("Press Ctrl+C to exit");

        tokio::select! {
            reason = scheduler.run(&mut console_input) => {
                warn!("Restart requested: {:?}", reason);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}
