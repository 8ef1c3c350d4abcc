//! Configuration file acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A TOML file on disk fully describes the cycle, slot layout and drivers
//! - Missing sections fall back to the built-in defaults
//! - A slot layout that disagrees with the slot count is rejected when the
//!   scheduler is built, before anything runs
//! - Unreadable or malformed files are reported as configuration errors

use hand_common::config::{ConfigError, HandConfig, ReportFormat, SignalSource, TaskKind};
use hand_common::error::HandError;
use hand_drivers::{SignalBus, SimBoard};
use hand_runtime::clock::ManualClock;
use hand_runtime::scheduler::CycleScheduler;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn build(config: &HandConfig, board: &SimBoard) -> Result<CycleScheduler<ManualClock>, HandError> {
    let registry = board.compose(config, &Arc::new(SignalBus::new()))?;
    CycleScheduler::initialize(config.cycle, registry, ManualClock::new(0))
}

#[test]
fn test_load_custom_layout_from_file() {
    let file = write_config(
        r#"
[cycle]
cycle_length_ms = 20
task_slot_count = 4

[tasks]
slots = ["servo", "potentiometer", "buttons", "idle"]

[diagnostics]
interval = "250ms"
format = "json"

[drivers]
signal_source = "sensor"
debounce_samples = 2

[drivers.servo]
min_pulse_us = 1000
max_pulse_us = 2000
inverted = true
"#,
    );

    let config = HandConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.cycle.slot_length_us(), 5_000);
    assert_eq!(config.diagnostics.interval, Duration::from_millis(250));
    assert_eq!(config.diagnostics.format, ReportFormat::Json);
    assert_eq!(config.drivers.signal_source, Some(SignalSource::Sensor));
    assert!(!config.realtime.enabled);

    let sched = build(&config, &SimBoard::default()).unwrap();
    assert_eq!(sched.slot_length_us(), 5_000);
    assert_eq!(sched.slot_names(), ["srv", "pot", "btn", "idle"]);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("");
    let config = HandConfig::from_file(file.path()).unwrap();

    assert_eq!(config.cycle.cycle_length_ms, 10);
    assert_eq!(config.cycle.task_slot_count, 10);
    assert_eq!(config.tasks.slots.len(), 10);
    assert!(build(&config, &SimBoard::default()).is_ok());
}

#[test]
fn test_layout_shorter_than_slot_count_rejected() {
    let file = write_config(
        r#"
[cycle]
cycle_length_ms = 10
task_slot_count = 10

[tasks]
slots = ["buttons", "potentiometer", "servo"]
"#,
    );
    let config = HandConfig::from_file(file.path()).unwrap();
    assert_eq!(config.tasks.slots, [TaskKind::Buttons, TaskKind::Potentiometer, TaskKind::Servo]);

    // Cardinality is only known once the registry exists
    config.validate().unwrap();
    let err = build(&config, &SimBoard::default()).unwrap_err();
    assert_eq!(
        err,
        HandError::SlotCountMismatch {
            expected: 10,
            actual: 3
        }
    );
}

#[test]
fn test_uneven_cycle_rejected() {
    let file = write_config(
        r#"
[cycle]
cycle_length_ms = 1
task_slot_count = 3

[tasks]
slots = ["idle", "idle", "idle"]
"#,
    );
    let config = HandConfig::from_file(file.path()).unwrap();

    assert!(matches!(config.validate(), Err(HandError::InvalidCycle { .. })));
    assert!(matches!(
        build(&config, &SimBoard::default()),
        Err(HandError::InvalidCycle { .. })
    ));
}

#[test]
fn test_saved_config_loads_back() {
    let mut config = HandConfig::default();
    config.cycle.task_slot_count = 5;
    config.tasks.slots.truncate(5);
    config.drivers.smoothing_shift = 0;

    let file = write_config(&config.to_toml().unwrap());
    let loaded = HandConfig::from_file(file.path()).unwrap();

    assert_eq!(loaded.cycle, config.cycle);
    assert_eq!(loaded.tasks, config.tasks);
    assert_eq!(loaded.drivers.smoothing_shift, 0);
    assert_eq!(build(&loaded, &SimBoard::default()).unwrap().slot_length_us(), 2_000);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = HandConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("absent.toml")));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let file = write_config("[cycle]\ncycle_length_ms = \"ten\"\n");
    assert!(matches!(
        HandConfig::from_file(file.path()),
        Err(ConfigError::Parse(_))
    ));
}
