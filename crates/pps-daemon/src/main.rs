//! ppsstat entry point.
//!
//! Acquires one PPS source, then runs the capture loop until a signal,
//! the report limit, or a fatal fetch error ends it.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use pps_common::config::{MonitorConfig, OutputFormat, TimeoutPolicy};
use pps_common::time::Timestamp;
use pps_runtime::monitor::{Monitor, RunSummary};
use pps_source::{PpsSource, SimulatedSource};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::signals::SignalHandler;

/// Per-pulse jitter of the `--simulate` source.
const SIMULATED_JITTER: Duration = Duration::from_micros(2);

/// ppsstat command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "ppsstat",
    about = "Monitor a PPS source and print live jitter statistics",
    version,
    long_about = None
)]
struct Args {
    /// PPS device path(s). Only the first one is monitored.
    #[arg(value_name = "PPSDEV", required_unless_present = "simulate", num_args = 1..)]
    devices: Vec<PathBuf>,

    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fetch timeout, e.g. "3s" or "1500ms" (overrides config file).
    #[arg(long, short = 't', value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Exit with failure when no pulse arrives within the timeout.
    #[arg(long)]
    exit_on_timeout: bool,

    /// Stop after this many reports (0 = infinite).
    #[arg(long, short = 'n', value_name = "N")]
    count: Option<u64>,

    /// Print one JSON object per report instead of text.
    #[arg(long)]
    json: bool,

    /// Use a synthetic 1 PPS source instead of a device.
    #[arg(long)]
    simulate: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ppsstat");

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    info!(
        fetch_timeout = %humantime::format_duration(config.fetch_timeout),
        timeout_policy = ?config.timeout_policy,
        output = ?config.output,
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    let summary = if args.simulate {
        info!(jitter = ?SIMULATED_JITTER, "Using simulated PPS source");
        let source = SimulatedSource::free_running(wall_clock_now(), SIMULATED_JITTER, true);
        run_monitor(source, config, &signal_handler)?
    } else {
        let device = select_device(&args.devices)?;
        let source = pps_source::acquire(device)
            .with_context(|| format!("Failed to acquire PPS source {}", device.display()))?;
        run_monitor(source, config, &signal_handler)?
    };

    info!(
        reports = summary.reports,
        interruptions = summary.interruptions,
        timeouts = summary.timeouts,
        missed_pulses = summary.missed_pulses,
        anomalies = summary.anomalies,
        mean_us = summary.mean_us.unwrap_or(0.0),
        std_dev_us = summary.std_dev_us.unwrap_or(0.0),
        signals = signal_handler.state().signal_count(),
        last_signal = ?signal_handler.state().last_signal(),
        reason = %summary.stop_reason,
        "ppsstat shutdown complete"
    );

    Ok(())
}

/// Initialize logging on stderr; stdout carries the reports.
fn init_logging(level: &str) {
    let filter = format!(
        "ppsstat={level},pps_runtime={level},pps_source={level},pps_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PPSSTAT_CONFIG` environment variable
/// 3. `/etc/ppsstat/config.toml` (system path)
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<MonitorConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return MonitorConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("PPSSTAT_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from PPSSTAT_CONFIG");
            return MonitorConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from PPSSTAT_CONFIG={env_path}")
            });
        }
        warn!(
            path = %env_path,
            "PPSSTAT_CONFIG set but file does not exist, checking other locations"
        );
    }

    let system_path = Path::new("/etc/ppsstat/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return MonitorConfig::from_file(system_path)
            .with_context(|| format!("Failed to load config from {}", system_path.display()));
    }

    info!("No config file found, using built-in defaults");
    Ok(MonitorConfig::default())
}

/// Command-line flags win over the config file.
fn apply_overrides(config: &mut MonitorConfig, args: &Args) {
    if let Some(timeout) = args.timeout {
        config.fetch_timeout = timeout;
    }
    if args.exit_on_timeout {
        config.timeout_policy = TimeoutPolicy::Exit;
    }
    if let Some(count) = args.count {
        config.max_reports = count;
    }
    if args.json {
        config.output = OutputFormat::Json;
    }
}

/// Pick the device to monitor. Additional paths are accepted but ignored.
fn select_device(devices: &[PathBuf]) -> Result<&Path> {
    let (first, rest) = devices
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("no PPS device given"))?;
    if !rest.is_empty() {
        warn!(
            ignored = ?rest,
            "Only one PPS source is monitored per run, ignoring the others"
        );
    }
    Ok(first)
}

fn wall_clock_now() -> Timestamp {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timestamp::new(
        i64::try_from(now.as_secs()).unwrap_or(i64::MAX),
        now.subsec_nanos(),
    )
}

/// Run the capture loop, writing reports to stdout.
fn run_monitor<S: PpsSource>(
    source: S,
    config: MonitorConfig,
    signal_handler: &SignalHandler,
) -> Result<RunSummary> {
    let stdout = std::io::stdout().lock();
    let mut monitor = Monitor::new(source, stdout, config);
    monitor
        .run(|| signal_handler.shutdown_requested())
        .context("Capture loop failed")
}
