//! Prosthetic hand daemon entry point.
//!
//! Loads the configuration, initializes the collaborators, builds the cycle
//! scheduler and busy-polls it until a signal, a tick limit or a time limit
//! stops it. A background thread reports slot runtimes.

mod diagnostics;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use hand_common::config::{HandConfig, RealtimeConfig, ReportFormat};
use hand_common::state::{ControllerState, StateMachine};
use hand_drivers::{SignalBus, SimBoard};
use hand_runtime::clock::MonotonicClock;
use hand_runtime::realtime::init_realtime;
use hand_runtime::scheduler::{CycleScheduler, SchedulerBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::diagnostics::DiagnosticsReporter;
use crate::signals::{log_shutdown_cause, ShutdownFlag};

/// Hand daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "hand-daemon",
    about = "Prosthetic hand controller - slot-scheduled peripheral control loop",
    version,
    long_about = None
)]
struct Args {
    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many slot fires (0 = run until signaled).
    #[arg(long, default_value = "0")]
    max_ticks: u64,

    /// Stop after this much time, e.g. "30s" or "5min".
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Diagnostics report format (text, json). Overrides the config file.
    #[arg(long, value_parser = parse_report_format)]
    report_format: Option<ReportFormat>,

    /// Disable the diagnostics reporter.
    #[arg(long)]
    no_diagnostics: bool,
}

fn parse_report_format(s: &str) -> std::result::Result<ReportFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Ok(ReportFormat::Text),
        "json" => Ok(ReportFormat::Json),
        other => Err(format!("unknown report format '{other}' (expected text or json)")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting hand daemon");

    let mut lifecycle = StateMachine::new();
    let result = run_daemon(&args, &mut lifecycle);

    if let Err(e) = &result {
        lifecycle.enter_fault();
        let message = format!("{e:#}");
        error!(state = %lifecycle.state(), error = %message, "Controller failed");
        if let Err(e) = lifecycle.transition(ControllerState::Stopped) {
            warn!(error = %e, "Could not record stop");
        }
    }
    result
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr; stdout carries the diagnostics reports.
fn init_logging(level: &str) {
    let filter = format!("hand_daemon={level},hand_runtime={level},hand_drivers={level},hand_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `HAND_CONFIG_PATH` environment variable
/// 3. `/etc/prosthetic-hand/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<HandConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return HandConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("HAND_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from HAND_CONFIG_PATH");
            return HandConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from HAND_CONFIG_PATH={env_path:?}"));
        }
        warn!(
            path = %env_path,
            "HAND_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    for candidate in ["/etc/prosthetic-hand/config.toml", "config/default.toml"] {
        let config_path = PathBuf::from(candidate);
        if config_path.exists() {
            info!(?config_path, "Loading config file");
            return HandConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {config_path:?}"));
        }
    }

    info!("No config file found, using built-in defaults");
    Ok(HandConfig::default())
}

/// BOOT → INIT → RUN → STOPPED. Any error leaves the caller to enter FAULT.
fn run_daemon(args: &Args, lifecycle: &mut StateMachine) -> Result<()> {
    let mut config = load_config(args)?;
    if let Some(format) = args.report_format {
        config.diagnostics.format = format;
    }
    if args.no_diagnostics {
        config.diagnostics.enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        cycle_length_ms = config.cycle.cycle_length_ms,
        task_slot_count = config.cycle.task_slot_count,
        slots = ?config.tasks.slots,
        "Configuration loaded"
    );

    let shutdown = ShutdownFlag::install().context("Failed to set up signal handlers")?;

    lifecycle.transition(ControllerState::Init)?;
    info!(state = %lifecycle.state(), "Initializing collaborators");

    init_realtime(&config.realtime).context("Real-time setup failed")?;

    let bus = Arc::new(SignalBus::new());
    let board = SimBoard::default();
    let registry = board
        .compose(&config, &bus)
        .context("Failed to initialize collaborators")?;

    let mut scheduler = SchedulerBuilder::new(MonotonicClock::new())
        .config(config.cycle)
        .registry(registry)
        .build()
        .context("Failed to initialize cycle scheduler")?;

    let reporter = if config.diagnostics.enabled {
        Some(spawn_reporter(&config, &mut scheduler, &bus, &shutdown)?)
    } else {
        info!("Diagnostics reporter disabled");
        None
    };

    lifecycle.transition(ControllerState::Run)?;
    info!(state = %lifecycle.state(), "Entering control loop");

    let started = Instant::now();
    run_loop(&mut scheduler, &shutdown, args.max_ticks, args.duration);
    let elapsed = started.elapsed();

    log_shutdown_cause(&shutdown);
    shutdown.raise();
    if let Some(handle) = reporter {
        match handle.join() {
            Ok(reports) => info!(reports, "Diagnostics reporter stopped"),
            Err(_) => warn!("Diagnostics reporter panicked"),
        }
    }

    lifecycle.transition(ControllerState::Stopped)?;
    log_summary(&scheduler, elapsed);
    info!(state = %lifecycle.state(), "Daemon shutdown complete");
    Ok(())
}

fn spawn_reporter(
    config: &HandConfig,
    scheduler: &mut CycleScheduler<MonotonicClock>,
    bus: &Arc<SignalBus>,
    shutdown: &ShutdownFlag,
) -> Result<JoinHandle<u64>> {
    let reporter = DiagnosticsReporter::new(
        scheduler.shared_ledger(),
        scheduler.slot_names(),
        scheduler.registry().probes().to_vec(),
        config.cycle.slot_length_us(),
        config.diagnostics.format,
    )
    .with_bus(Arc::clone(bus));
    reporter
        .spawn(
            std::io::stdout(),
            config.diagnostics.interval,
            diagnostics_cpu(&config.realtime),
            shutdown.clone(),
        )
        .context("Failed to spawn diagnostics reporter")
}

/// CPU to pin the reporter to. Real-time settings only apply when enabled.
fn diagnostics_cpu(realtime: &RealtimeConfig) -> Option<usize> {
    realtime.diagnostics_cpu.filter(|_| realtime.enabled)
}

/// Busy-poll the scheduler until shutdown, the tick limit or the time limit.
fn run_loop(
    scheduler: &mut CycleScheduler<MonotonicClock>,
    shutdown: &ShutdownFlag,
    max_ticks: u64,
    duration: Option<Duration>,
) {
    let deadline = duration.map(|d| Instant::now() + d);

    while !shutdown.is_raised() {
        match scheduler.poll() {
            Some(fire) => {
                if max_ticks > 0 && fire.fire_count >= max_ticks {
                    info!(ticks = fire.fire_count, "Maximum tick count reached");
                    break;
                }
            }
            None => std::hint::spin_loop(),
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("Run duration elapsed");
            break;
        }
    }
}

fn log_summary(scheduler: &CycleScheduler<MonotonicClock>, elapsed: Duration) {
    let names = scheduler.slot_names();
    for (slot, m) in scheduler.ledger().iter() {
        info!(
            slot,
            name = names.get(slot).map_or("?", String::as_str),
            current_us = m.current_us,
            min_us = m.min_us,
            max_us = m.max_us,
            "Slot runtime"
        );
    }

    let snapshot = scheduler.ledger().snapshot();
    let over_budget: Vec<usize> = snapshot.over_budget(scheduler.config().slot_length_us()).collect();
    info!(
        fires = scheduler.fire_count(),
        cycles = scheduler.cycle_count(),
        worst_case_us = snapshot.worst_case_us(),
        ?over_budget,
        uptime = %humantime::format_duration(Duration::from_millis(
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        )),
        "Run summary"
    );
}
