//! Runtime measurement ledger.
//!
//! One [`RuntimeMeasurement`] per task slot, tracking the current, minimum
//! and maximum execution time of the task bound to that slot. Records are
//! zeroed at initialization and updated after every slot fire.
//!
//! # Unmeasured sentinel
//!
//! A record whose `min_us` is `0` is treated as unmeasured: the next
//! [`RuntimeMeasurement::record`] replaces it unconditionally. A genuine
//! 0us execution is therefore indistinguishable from "never ran", and a
//! later non-zero sample will overwrite a 0us minimum.

use serde::{Deserialize, Serialize};

/// Execution time statistics for one task slot, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMeasurement {
    /// Duration of the most recent execution.
    pub current_us: u32,
    /// Shortest execution observed.
    pub min_us: u32,
    /// Longest execution observed.
    pub max_us: u32,
}

impl RuntimeMeasurement {
    /// All-zero record used before the first measurement.
    pub const UNMEASURED: Self = Self {
        current_us: 0,
        min_us: 0,
        max_us: 0,
    };

    /// Fold one execution time into the record.
    #[inline]
    pub fn record(&mut self, duration_us: u32) {
        self.current_us = duration_us;

        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
        if duration_us < self.min_us {
            self.min_us = duration_us;
        }
        // Sentinel replacement: 0 means no minimum has been taken yet
        if self.min_us == 0 {
            self.min_us = duration_us;
        }
    }

    /// Whether this record still holds the unmeasured sentinel.
    #[must_use]
    pub fn is_unmeasured(&self) -> bool {
        *self == Self::UNMEASURED
    }

    /// Spread between the longest and shortest execution.
    #[must_use]
    pub fn jitter_us(&self) -> u32 {
        self.max_us.saturating_sub(self.min_us)
    }
}

/// Fixed-size table of per-slot measurements.
///
/// Sized once from the slot count; recording never allocates.
#[derive(Debug, Clone)]
pub struct RuntimeLedger {
    slots: Box<[RuntimeMeasurement]>,
}

impl RuntimeLedger {
    /// Create a ledger with `slot_count` unmeasured records.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![RuntimeMeasurement::UNMEASURED; slot_count].into_boxed_slice(),
        }
    }

    /// Record an execution time for `slot`.
    ///
    /// Out-of-range slots are ignored; the scheduler only passes indices
    /// below the slot count it was built with.
    #[inline]
    pub fn record(&mut self, slot: usize, duration_us: u32) {
        debug_assert!(slot < self.slots.len(), "slot {slot} out of range");
        if let Some(measurement) = self.slots.get_mut(slot) {
            measurement.record(duration_us);
        }
    }

    /// Get the record for `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&RuntimeMeasurement> {
        self.slots.get(slot)
    }

    /// Number of slots tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ledger tracks no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over `(slot, measurement)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RuntimeMeasurement)> {
        self.slots.iter().enumerate()
    }

    /// Zero every record.
    pub fn reset(&mut self) {
        self.slots.fill(RuntimeMeasurement::UNMEASURED);
    }

    /// Copy the table for reporting.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            slots: self.slots.to_vec(),
        }
    }
}

/// Owned copy of the ledger for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// One record per slot, indexed by slot.
    pub slots: Vec<RuntimeMeasurement>,
}

impl LedgerSnapshot {
    /// Longest execution seen in any slot.
    #[must_use]
    pub fn worst_case_us(&self) -> u32 {
        self.slots.iter().map(|m| m.max_us).max().unwrap_or(0)
    }

    /// Slots whose longest execution exceeded `budget_us`.
    pub fn over_budget(&self, budget_us: u32) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.max_us > budget_us)
            .map(|(slot, _)| slot)
    }
}
