//! Slot-based cooperative cycle scheduler.
//!
//! One control cycle is divided into `task_slot_count` equal slots. The
//! host calls [`CycleScheduler::tick`] (or [`CycleScheduler::poll`]) as
//! often as it can; whenever at least one slot length has elapsed since the
//! previous fire, the task in the current slot runs to completion, its
//! execution time is recorded, and the slot index advances:
//!
//! ```text
//!  cycle_length_ms
//! ├────┬────┬────┬────┬────┬────┬────┬────┬────┬────┤
//! │ 0  │ 1  │ 2  │ 3  │ 4  │ 5  │ 6  │ 7  │ 8  │ 9  │ → 0, 1, ...
//! └────┴────┴────┴────┴────┴────┴────┴────┴────┴────┘
//!   slot_length_us = 1000 * cycle_length_ms / task_slot_count
//! ```
//!
//! Missed slots are not caught up: after a stall the due slot fires once
//! and the schedule continues from the time of that fire. Task overruns are
//! not detected here; they show up as `max_us` in the ledger.

use crate::clock::Clock;
use crate::registry::TaskRegistry;
use crate::shared_ledger::SharedLedger;
use hand_common::config::CycleConfig;
use hand_common::error::{HandError, HandResult};
use hand_common::ledger::RuntimeLedger;
use std::sync::Arc;
use tracing::{error, info, trace};

/// Outcome of a tick that fired a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFire {
    /// Slot that ran.
    pub slot: usize,
    /// Execution time of the slot's task.
    pub duration_us: u32,
    /// Total fires since initialization, including this one.
    pub fire_count: u64,
}

/// Cycle scheduler state, ledger and dispatch table.
pub struct CycleScheduler<C: Clock> {
    /// Clock used for task timing and [`CycleScheduler::poll`].
    clock: C,
    /// Dispatch table, one entry per slot.
    registry: TaskRegistry,
    /// Per-slot execution times.
    ledger: RuntimeLedger,
    /// Optional mirror for the diagnostics thread.
    shared: Option<Arc<SharedLedger>>,
    /// Validated cycle configuration.
    config: CycleConfig,
    /// Cached `config.slot_length_us()`.
    slot_length_us: u64,
    /// Timestamp of the most recent fire.
    last_fire_us: u64,
    /// Slot that fires next.
    current_slot: usize,
    /// Total fires since initialization.
    fire_count: u64,
}

impl<C: Clock> std::fmt::Debug for CycleScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("last_fire_us", &self.last_fire_us)
            .field("current_slot", &self.current_slot)
            .field("fire_count", &self.fire_count)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> CycleScheduler<C> {
    /// Validate the configuration against the registry and build a scheduler.
    ///
    /// The ledger starts unmeasured, slot 0 fires first, and the first fire
    /// happens one slot length after the current clock reading.
    ///
    /// Collaborators must already be initialized; this never calls
    /// [`Collaborator::init`](crate::registry::Collaborator::init).
    ///
    /// # Errors
    ///
    /// - [`HandError::InvalidCycle`] if the cycle cannot be split into slots.
    /// - [`HandError::SlotCountMismatch`] if the registry does not have exactly
    ///   `task_slot_count` entries.
    pub fn initialize(config: CycleConfig, registry: TaskRegistry, clock: C) -> HandResult<Self> {
        if let Err(e) = config.validate() {
            error!(error = %e, "Rejecting cycle configuration");
            return Err(e);
        }

        if registry.len() != config.slot_count() {
            let err = HandError::SlotCountMismatch {
                expected: config.slot_count(),
                actual: registry.len(),
            };
            error!(error = %err, "Rejecting task registry");
            return Err(err);
        }

        let last_fire_us = clock.now_us();

        info!(
            cycle_length_ms = config.cycle_length_ms,
            task_slot_count = config.task_slot_count,
            slot_length_us = config.slot_length_us(),
            slots = ?registry.slot_names(),
            "Cycle scheduler initialized"
        );

        Ok(Self {
            clock,
            registry,
            ledger: RuntimeLedger::new(config.slot_count()),
            shared: None,
            config,
            slot_length_us: u64::from(config.slot_length_us()),
            last_fire_us,
            current_slot: 0,
            fire_count: 0,
        })
    }

    /// Advance the schedule to `now_us`.
    ///
    /// Does nothing and returns `None` if less than one slot length has
    /// elapsed since the last fire. Otherwise runs the current slot's task,
    /// records its execution time and moves to the next slot.
    ///
    /// Elapsed time is computed with wrapping subtraction, so a clock that
    /// overflows past zero keeps the schedule intact.
    pub fn tick(&mut self, now_us: u64) -> Option<SlotFire> {
        let elapsed = now_us.wrapping_sub(self.last_fire_us);
        if elapsed < self.slot_length_us {
            return None;
        }
        self.last_fire_us = now_us;

        let slot = self.current_slot;
        let start = self.clock.now_us();
        self.registry.dispatch(slot);
        let duration_us = u32::try_from(self.clock.now_us().wrapping_sub(start)).unwrap_or(u32::MAX);

        self.ledger.record(slot, duration_us);
        if let (Some(shared), Some(measurement)) = (&self.shared, self.ledger.get(slot)) {
            shared.publish(slot, *measurement);
        }

        self.current_slot += 1;
        if self.current_slot >= self.registry.len() {
            self.current_slot = 0;
        }
        self.fire_count += 1;

        trace!(slot, duration_us, elapsed_us = elapsed, "Slot fired");

        Some(SlotFire {
            slot,
            duration_us,
            fire_count: self.fire_count,
        })
    }

    /// Read the scheduler's clock and [`tick`](Self::tick).
    #[inline]
    pub fn poll(&mut self) -> Option<SlotFire> {
        let now_us = self.clock.now_us();
        self.tick(now_us)
    }

    /// Busy-poll until `stop` returns `true`.
    ///
    /// `stop` is checked before every poll, so it should be cheap (an atomic load).
    /// Returns the number of slots fired.
    pub fn run_until<F>(&mut self, mut stop: F) -> u64
    where
        F: FnMut() -> bool,
    {
        let fired_before = self.fire_count;
        while !stop() {
            if self.poll().is_none() {
                std::hint::spin_loop();
            }
        }
        self.fire_count - fired_before
    }

    /// Mirror every ledger update into a [`SharedLedger`] and return it.
    ///
    /// The mirror is created on first call with the current ledger contents;
    /// later calls return the same instance.
    pub fn shared_ledger(&mut self) -> Arc<SharedLedger> {
        if let Some(shared) = &self.shared {
            return Arc::clone(shared);
        }
        let shared = Arc::new(SharedLedger::new(self.ledger.len()));
        for (slot, measurement) in self.ledger.iter().filter(|(_, m)| !m.is_unmeasured()) {
            shared.publish(slot, *measurement);
        }
        self.shared = Some(Arc::clone(&shared));
        shared
    }

    /// Per-slot execution times.
    #[must_use]
    pub fn ledger(&self) -> &RuntimeLedger {
        &self.ledger
    }

    /// Cycle configuration.
    #[must_use]
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Slot length in microseconds.
    #[must_use]
    pub fn slot_length_us(&self) -> u64 {
        self.slot_length_us
    }

    /// Slot that fires on the next due tick.
    #[must_use]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Timestamp of the most recent fire (the initial clock reading before any).
    #[must_use]
    pub fn last_fire_us(&self) -> u64 {
        self.last_fire_us
    }

    /// Total slots fired since initialization.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// Full cycles completed since initialization.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.fire_count / self.registry.len() as u64
    }

    /// Names of the tasks in slot order.
    #[must_use]
    pub fn slot_names(&self) -> Vec<String> {
        self.registry.slot_names()
    }

    /// Dispatch table.
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}

/// Builder for configuring the scheduler.
pub struct SchedulerBuilder<C: Clock> {
    clock: C,
    config: CycleConfig,
    registry: TaskRegistry,
}

impl<C: Clock> SchedulerBuilder<C> {
    /// Create a builder with the default cycle and an empty registry.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            config: CycleConfig::default(),
            registry: TaskRegistry::new(),
        }
    }

    /// Set the cycle length and slot count.
    #[must_use]
    pub fn cycle(mut self, cycle_length_ms: u32, task_slot_count: u32) -> Self {
        self.config = CycleConfig::new(cycle_length_ms, task_slot_count);
        self
    }

    /// Set the full cycle configuration.
    #[must_use]
    pub fn config(mut self, config: CycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dispatch table.
    #[must_use]
    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Validate and build the scheduler.
    ///
    /// # Errors
    ///
    /// See [`CycleScheduler::initialize`].
    pub fn build(self) -> HandResult<CycleScheduler<C>> {
        CycleScheduler::initialize(self.config, self.registry, self.clock)
    }
}
