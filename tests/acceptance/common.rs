//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Building registries whose tasks log the slots they ran in
//! - Building registries whose tasks take a scripted amount of clock time
//! - Ticking a scheduler on a fixed grid

#![allow(dead_code)] // Not every test module uses every helper

use hand_common::config::CycleConfig;
use hand_runtime::clock::ManualClock;
use hand_runtime::registry::TaskRegistry;
use hand_runtime::scheduler::{CycleScheduler, SlotFire};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared log of slot indices in the order their tasks ran.
pub type FireLog = Arc<Mutex<Vec<usize>>>;

/// Registry of `slots` tasks that append their own slot index to a log.
pub fn recording_registry(slots: usize) -> (TaskRegistry, FireLog) {
    let log: FireLog = Arc::default();
    let mut registry = TaskRegistry::with_capacity(slots);
    for slot in 0..slots {
        let log = Arc::clone(&log);
        registry.push_task(format!("task{slot}"), move || {
            log.lock().unwrap().push(slot);
        });
    }
    (registry, log)
}

/// Registry where slot `i` advances `clock` by the next scripted duration
/// from `scripts[i]` each time it runs (0 once the script is exhausted).
pub fn timed_registry(clock: &ManualClock, scripts: Vec<Vec<u64>>) -> TaskRegistry {
    let mut registry = TaskRegistry::with_capacity(scripts.len());
    for (slot, script) in scripts.into_iter().enumerate() {
        let clock = clock.clone();
        let mut script: VecDeque<u64> = script.into();
        registry.push_task(format!("timed{slot}"), move || {
            clock.advance(script.pop_front().unwrap_or(0));
        });
    }
    registry
}

/// Build a scheduler on an existing manual clock, e.g. one shared with
/// [`timed_registry`] tasks.
pub fn scheduler_on(
    clock: &ManualClock,
    cycle_length_ms: u32,
    task_slot_count: u32,
    registry: TaskRegistry,
) -> CycleScheduler<ManualClock> {
    CycleScheduler::initialize(CycleConfig::new(cycle_length_ms, task_slot_count), registry, clock.clone())
        .expect("valid scheduler configuration")
}

/// Build a scheduler on a manual clock starting at `start_us`.
pub fn scheduler(
    cycle_length_ms: u32,
    task_slot_count: u32,
    registry: TaskRegistry,
    start_us: u64,
) -> (CycleScheduler<ManualClock>, ManualClock) {
    let clock = ManualClock::new(start_us);
    let scheduler = scheduler_on(&clock, cycle_length_ms, task_slot_count, registry);
    (scheduler, clock)
}

/// Move the clock to `now_us` and tick there, as a busy-poll loop would.
pub fn tick_at(scheduler: &mut CycleScheduler<ManualClock>, clock: &ManualClock, now_us: u64) -> Option<SlotFire> {
    clock.set(now_us);
    scheduler.tick(now_us)
}

/// Fire `count` slots on an exact slot-length grid after `start_us`.
pub fn fire_on_grid(
    scheduler: &mut CycleScheduler<ManualClock>,
    clock: &ManualClock,
    start_us: u64,
    count: u64,
) -> Vec<SlotFire> {
    let slot = scheduler.slot_length_us();
    (1..=count)
        .map(|i| {
            tick_at(scheduler, clock, start_us.wrapping_add(i * slot)).expect("grid tick must fire")
        })
        .collect()
}
