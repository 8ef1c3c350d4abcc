//! Slot scheduling acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Slots fire in the fixed order 0..n-1, 0, ... with no skips or repeats
//! - A tick less than one slot length after the last fire changes nothing
//! - A stall fires the due slot once; missed slots are not caught up
//! - Elapsed time survives the 64-bit clock wrapping past zero
//! - A registry of the wrong size is rejected before any task runs

use super::common::{fire_on_grid, recording_registry, scheduler, tick_at};
use hand_common::config::CycleConfig;
use hand_common::error::HandError;
use hand_runtime::clock::ManualClock;
use hand_runtime::registry::TaskRegistry;
use hand_runtime::scheduler::CycleScheduler;

/// 10 ms cycle split in 10 slots: ticks at 1000, 2000, ... 10000 fire 0..9.
#[test]
fn test_ten_slots_fire_once_each_in_order() {
    let (registry, log) = recording_registry(10);
    let (mut sched, clock) = scheduler(10, 10, registry, 0);
    assert_eq!(sched.slot_length_us(), 1_000);

    let fired: Vec<usize> = (1..=10u64)
        .map(|i| tick_at(&mut sched, &clock, i * 1_000).unwrap().slot)
        .collect();

    assert_eq!(fired, (0..10).collect::<Vec<_>>());
    assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
    assert_eq!(sched.current_slot(), 0);
    assert_eq!(sched.cycle_count(), 1);
}

#[test]
fn test_ordering_holds_for_every_slot_count() {
    for slots in 1..=10u32 {
        let (registry, log) = recording_registry(slots as usize);
        // One millisecond per slot keeps the division exact
        let (mut sched, clock) = scheduler(slots, slots, registry, 0);

        // Irregular spacing, never shorter than one slot
        let mut now = 0u64;
        let fires = u64::from(slots) * 3 + 1;
        for i in 0..fires {
            now += 1_000 + (i * 37) % 450;
            assert!(tick_at(&mut sched, &clock, now).is_some());
        }

        let expected: Vec<usize> = (0..fires).map(|i| (i % u64::from(slots)) as usize).collect();
        assert_eq!(*log.lock().unwrap(), expected, "slot count {slots}");
    }
}

#[test]
fn test_early_ticks_change_nothing() {
    let (registry, log) = recording_registry(4);
    let (mut sched, clock) = scheduler(4, 4, registry, 0);

    tick_at(&mut sched, &clock, 1_000).unwrap();
    let ledger_before = sched.ledger().snapshot();

    for now in [1_000, 1_001, 1_500, 1_999] {
        assert!(tick_at(&mut sched, &clock, now).is_none());
    }

    assert_eq!(sched.current_slot(), 1);
    assert_eq!(sched.last_fire_us(), 1_000);
    assert_eq!(sched.ledger().snapshot(), ledger_before);
    assert_eq!(*log.lock().unwrap(), vec![0]);
}

#[test]
fn test_stall_does_not_catch_up() {
    let (registry, log) = recording_registry(10);
    let (mut sched, clock) = scheduler(10, 10, registry, 0);

    // The host stalls for 7.3 cycles
    assert_eq!(tick_at(&mut sched, &clock, 73_000).map(|f| f.slot), Some(0));
    for now in [73_001, 73_500, 73_999] {
        assert!(tick_at(&mut sched, &clock, now).is_none());
    }

    // Schedule resumes from the late fire, one slot at a time
    let resumed = fire_on_grid(&mut sched, &clock, 73_000, 3);
    assert_eq!(resumed.iter().map(|f| f.slot).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn test_clock_wraparound() {
    let start = u64::MAX - 1_499;
    let (registry, log) = recording_registry(5);
    let (mut sched, clock) = scheduler(5, 5, registry, start);

    // Slot 0 fires 1000us after the start, still below the wrap
    assert_eq!(tick_at(&mut sched, &clock, start + 1_000).map(|f| f.slot), Some(0));

    // 999us later the counter has wrapped to 499
    assert!(tick_at(&mut sched, &clock, 499).is_none());

    // 1000us later: 500 after the wrap
    assert_eq!(tick_at(&mut sched, &clock, 500).map(|f| f.slot), Some(1));
    assert_eq!(sched.last_fire_us(), 500);

    assert!(tick_at(&mut sched, &clock, 1_499).is_none());
    assert_eq!(tick_at(&mut sched, &clock, 1_500).map(|f| f.slot), Some(2));
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_registry_size_mismatch_is_fatal() {
    let (registry, log) = recording_registry(8);
    let clock = ManualClock::new(0);

    let err = CycleScheduler::initialize(CycleConfig::new(10, 10), registry, clock).unwrap_err();

    assert_eq!(
        err,
        HandError::SlotCountMismatch {
            expected: 10,
            actual: 8
        }
    );
    assert!(err.to_string().contains("8 entries"));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_unsplittable_cycle_is_fatal() {
    for (cycle_ms, slots) in [(10, 0), (1, 3), (0, 1)] {
        let mut registry = TaskRegistry::new();
        for _ in 0..slots {
            registry.push_idle();
        }
        let result = CycleScheduler::initialize(CycleConfig::new(cycle_ms, slots), registry, ManualClock::new(0));
        assert!(
            matches!(result, Err(HandError::InvalidCycle { .. })),
            "{cycle_ms}ms / {slots} slots should be rejected"
        );
    }
}

#[test]
fn test_independent_schedulers() {
    let (registry_a, log_a) = recording_registry(2);
    let (registry_b, log_b) = recording_registry(5);
    let (mut a, clock_a) = scheduler(2, 2, registry_a, 0);
    let (mut b, clock_b) = scheduler(5, 5, registry_b, 0);

    fire_on_grid(&mut a, &clock_a, 0, 3);
    fire_on_grid(&mut b, &clock_b, 0, 1);

    assert_eq!(*log_a.lock().unwrap(), vec![0, 1, 0]);
    assert_eq!(*log_b.lock().unwrap(), vec![0]);
    assert_eq!(a.fire_count(), 3);
    assert_eq!(b.fire_count(), 1);
}
