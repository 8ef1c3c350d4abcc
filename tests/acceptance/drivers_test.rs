//! Simulated board acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - The default layout binds btn, pot, srv and sensor into slots 0..3
//! - Each collaborator runs once per cycle, so a button press needs
//!   `debounce_samples` whole cycles before it is accepted
//! - The potentiometer drives the servo pulse unless the DIP switch selects
//!   the muscle sensor
//! - Probe dumps reflect the state published by the running collaborators

use super::common::{fire_on_grid, scheduler_on};
use hand_common::config::{HandConfig, SignalSource};
use hand_drivers::{SignalBus, SimBoard};
use hand_runtime::clock::ManualClock;
use hand_runtime::scheduler::CycleScheduler;
use std::sync::Arc;

fn wired(board: &SimBoard, config: &HandConfig) -> (CycleScheduler<ManualClock>, ManualClock, Arc<SignalBus>) {
    let bus = Arc::new(SignalBus::new());
    let registry = board.compose(config, &bus).unwrap();
    let clock = ManualClock::new(0);
    let sched = scheduler_on(&clock, config.cycle.cycle_length_ms, config.cycle.task_slot_count, registry);
    (sched, clock, bus)
}

#[test]
fn test_default_layout_names() {
    let (sched, _, _) = wired(&SimBoard::default(), &HandConfig::default());

    let names = sched.slot_names();
    assert_eq!(&names[..4], ["btn", "pot", "srv", "sensor"]);
    assert!(names[4..].iter().all(|n| n == "idle"));
}

#[test]
fn test_button_press_accepted_after_debounce_cycles() {
    let board = SimBoard::default();
    let config = HandConfig::default();
    let debounce = u64::from(config.drivers.debounce_samples);
    let (mut sched, clock, bus) = wired(&board, &config);

    board.buttons[1].set(true);

    // One sample per cycle: the last required sample is in cycle `debounce`
    let fires = (debounce - 1) * 10;
    fire_on_grid(&mut sched, &clock, 0, fires);
    assert!(!bus.button(1));

    fire_on_grid(&mut sched, &clock, fires * 1_000, 1);
    assert!(bus.button(1));
    assert_eq!(bus.buttons(), [false, true, false, false]);
}

#[test]
fn test_potentiometer_drives_servo() {
    let board = SimBoard::default();
    let (mut sched, clock, bus) = wired(&board, &HandConfig::default());
    assert_eq!(board.servo.pulse_us(), 500);

    board.potentiometer.set(4095);
    let mut last = 500;
    for cycle in 0..60u64 {
        fire_on_grid(&mut sched, &clock, cycle * 10_000, 10);
        let pulse = board.servo.pulse_us();
        assert!(pulse >= last, "servo moved backwards in cycle {cycle}");
        last = pulse;
    }

    assert_eq!(bus.potentiometer(), 4095);
    assert_eq!(board.servo.pulse_us(), 2500);
    assert_eq!(bus.servo_pulse_us(), 2500);
}

#[test]
fn test_dip_switch_selects_sensor() {
    let board = SimBoard::default();
    board.dip_source.set(true);
    board.sensor.set(2048);
    let (mut sched, clock, bus) = wired(&board, &HandConfig::default());
    assert_eq!(bus.signal_source(), SignalSource::Sensor);

    fire_on_grid(&mut sched, &clock, 0, 20);
    assert_eq!(board.servo.pulse_us(), 1500);

    // The potentiometer is sampled but no longer moves the servo. Sixty
    // cycles let its smoothed value settle on the new reading.
    board.potentiometer.set(4095);
    fire_on_grid(&mut sched, &clock, 20_000, 600);
    assert_eq!(board.servo.pulse_us(), 1500);
    assert_eq!(bus.potentiometer(), 4095);
}

#[test]
fn test_config_override_beats_dip_switch() {
    let board = SimBoard::default();
    board.dip_source.set(true);
    board.sensor.set(4095);
    let mut config = HandConfig::default();
    config.drivers.signal_source = Some(SignalSource::Potentiometer);

    let (mut sched, clock, bus) = wired(&board, &config);
    fire_on_grid(&mut sched, &clock, 0, 30);

    assert_eq!(bus.signal_source(), SignalSource::Potentiometer);
    assert_eq!(bus.sensor(), 0);
    assert_eq!(board.servo.pulse_us(), 500);
}

#[test]
fn test_probe_dumps_follow_running_state() {
    let board = SimBoard::default();
    let mut config = HandConfig::default();
    config.drivers.debounce_samples = 1;
    let (mut sched, clock, _) = wired(&board, &config);

    board.buttons[3].set(true);
    fire_on_grid(&mut sched, &clock, 0, 10);

    let dumps: Vec<String> = sched.registry().probes().iter().map(|p| p.debug_dump()).collect();
    assert_eq!(
        dumps,
        [
            "btn states: [0, 0, 0, 1]",
            "pot value: 0",
            "srv pulse: 500us (source: potentiometer)",
            "sensor value: - (released)",
        ]
    );
}

#[test]
fn test_each_collaborator_samples_once_per_cycle() {
    let board = SimBoard::default();
    let (mut sched, clock, _) = wired(&board, &HandConfig::default());
    let pot_samples = board.potentiometer.samples();
    let sensor_samples = board.sensor.samples();

    fire_on_grid(&mut sched, &clock, 0, 70);

    assert_eq!(board.potentiometer.samples() - pot_samples, 7);
    // Released sensors keep their slot but stop sampling
    assert_eq!(board.sensor.samples(), sensor_samples);
}
