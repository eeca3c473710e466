//! hubclock daemon entry point.
//!
//! Builds the timestamp synchronizer on the hardware counter, then samples
//! it periodically on a worker thread, printing one JSON diagnostics line
//! per sample until SIGINT or SIGTERM. SIGHUP forces a recalibration.

mod diagnostics;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use hubclock_common::config::{HubConfig, LogConfig, LogLevel};
use hubclock_runtime::{Wakelock, Worker};
use hubclock_sync::TimeSync;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Span};

use crate::diagnostics::SyncReport;
use crate::signals::{wait_for_shutdown, SignalHandler};

/// Default system-wide configuration file.
const SYSTEM_CONFIG_PATH: &str = "/etc/hubclock/config.toml";

/// Environment variable naming a configuration file.
const CONFIG_PATH_ENV: &str = "HUBCLOCK_CONFIG_PATH";

/// hubclock daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "hubclockd",
    about = "Hardware tick counter to wall-clock synchronization daemon",
    version,
    long_about = None
)]
struct Args {
    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (silent, error, info, debug, verbose); overrides the config file.
    #[arg(long, short = 'l', value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Interval between samples, e.g. "500ms" or "2s"; overrides the config file.
    #[arg(long, short = 'p', value_parser = humantime::parse_duration)]
    period: Option<Duration>,

    /// Number of samples to take (0 = until signalled).
    #[arg(long, short = 'n', default_value = "0")]
    samples: u64,

    /// Hold the kernel wake lock while sampling.
    #[arg(long)]
    wakelock: bool,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    match value.to_ascii_lowercase().as_str() {
        "silent" => Ok(LogLevel::Silent),
        "error" => Ok(LogLevel::Error),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "verbose" => Ok(LogLevel::Verbose),
        other => Err(format!("unknown log level: {other}")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(period) = args.period {
        config.worker.sample_period = period;
    }
    if args.wakelock {
        config.wakelock.enabled = true;
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging);
    let span = info_span!("hubclockd", tag = %config.logging.tag);
    let _enter = span.enter();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval = ?config.sync.recalibration_interval,
        gap_threshold = ?config.sync.gap_threshold,
        max_iterations = config.sync.max_iterations,
        "Starting hubclock daemon"
    );

    let signal_handler = SignalHandler::install().context("Failed to set up signal handlers")?;

    run_daemon(&config, &signal_handler, args.samples, &span)
}

/// Install the global subscriber described by `logging`.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LogConfig) {
    let level = logging.level.as_filter();
    let filter = format!(
        "hubclockd={level},hubclock_sync={level},hubclock_runtime={level},hubclock_common={level}"
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true);

    if logging.stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.with_writer(std::io::stdout).init();
    }
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `HUBCLOCK_CONFIG_PATH` environment variable
/// 3. `/etc/hubclock/config.toml`
/// 4. Built-in defaults
///
/// Runs before logging is installed, so fallbacks are reported on stderr.
fn load_config(cli_path: Option<&PathBuf>) -> Result<HubConfig> {
    if let Some(config_path) = cli_path {
        return HubConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            return HubConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from {CONFIG_PATH_ENV}={env_path}")
            });
        }
        eprintln!("{CONFIG_PATH_ENV}={env_path} does not exist, checking other locations");
    }

    let system_path = PathBuf::from(SYSTEM_CONFIG_PATH);
    if system_path.exists() {
        return HubConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {SYSTEM_CONFIG_PATH}"));
    }

    Ok(HubConfig::default())
}

/// Sample the synchronizer until the sample budget runs out or a shutdown
/// signal arrives.
fn run_daemon(
    config: &HubConfig,
    signal_handler: &SignalHandler,
    max_samples: u64,
    span: &Span,
) -> Result<()> {
    let sync = Arc::new(TimeSync::hardware(&config.sync));
    info!(
        frequency_hz = sync.frequency_hz(),
        offset_ns = sync.current_offset_ns(),
        "Synchronizer calibrated"
    );

    let wakelock = if config.wakelock.enabled {
        let lock = Wakelock::open(&config.wakelock).context("Failed to open wake lock")?;
        Some(Arc::new(lock))
    } else {
        None
    };

    let worker = Worker::spawn(&config.worker.thread_name).context("Failed to start worker")?;
    let period = config.worker.sample_period;
    let mut sequence = 0u64;

    loop {
        if signal_handler.shutdown_requested() {
            info!("Shutdown signal received");
            break;
        }

        if signal_handler.take_recalibration_request() {
            info!("Recalibration requested by SIGHUP");
            let sync = Arc::clone(&sync);
            let span = span.clone();
            worker
                .add_task(move || {
                    let _enter = span.enter();
                    sync.force_recalibrate();
                })
                .context("Failed to queue recalibration")?;
        }

        sequence += 1;
        queue_sample(&worker, &sync, wakelock.as_ref(), sequence, span)?;

        if max_samples > 0 && sequence >= max_samples {
            info!(samples = sequence, "Sample budget reached");
            break;
        }

        if wait_for_shutdown(signal_handler, period) {
            info!("Shutdown signal received");
            break;
        }
    }

    // Let queued samples finish before reporting
    worker.shutdown();

    let stats = sync.stats();
    info!(
        samples = sequence,
        calibrations = stats.calibrations,
        forced = stats.forced,
        regressions = stats.regressions,
        non_convergent = stats.non_convergent,
        anomalies = stats.anomalies,
        signals = signal_handler.state().signal_count(),
        "Daemon shutdown complete"
    );

    Ok(())
}

/// Queue one sample on the worker, holding a wake reference while it runs.
fn queue_sample(
    worker: &Worker,
    sync: &Arc<TimeSync>,
    wakelock: Option<&Arc<Wakelock>>,
    sequence: u64,
    span: &Span,
) -> Result<()> {
    let sync = Arc::clone(sync);
    let wakelock = wakelock.map(Arc::clone);
    let span = span.clone();

    worker
        .add_task(move || {
            let _enter = span.enter();
            let _wake = match wakelock.as_deref().map(Wakelock::guard).transpose() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(%e, "sampling without wake lock");
                    None
                }
            };

            let report = SyncReport::sample(&*sync, sequence);
            match report.to_json_line() {
                Ok(line) => {
                    if let Err(e) = writeln!(std::io::stdout().lock(), "{line}") {
                        error!(%e, "failed to write report");
                    }
                }
                Err(e) => error!(%e, "failed to serialize report"),
            }
        })
        .context("Failed to queue sample")
}
