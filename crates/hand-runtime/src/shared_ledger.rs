//! Seqlock-published copy of the runtime measurement ledger.
//!
//! The scheduler owns the ledger and is its only writer. After each
//! record it publishes the updated slot here; the diagnostics reporter
//! reads consistent per-slot snapshots from another thread without ever
//! blocking the scheduler.
//!
//! # Protocol
//!
//! Each slot carries its own sequence number (odd = write in progress):
//!
//! - **Writer** (control thread): bump the sequence to odd, store the three
//!   fields, bump it back to even.
//! - **Reader** (reporter thread): read the sequence, the fields, then the
//!   sequence again; retry if it was odd or changed.
//!
//! Every field is an atomic, so a racing read is a retry, never a torn value.

use crossbeam_utils::{Backoff, CachePadded};
use hand_common::ledger::{LedgerSnapshot, RuntimeMeasurement};
use std::fmt;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};

#[derive(Default)]
struct SlotCell {
    sequence: AtomicU64,
    current_us: AtomicU32,
    min_us: AtomicU32,
    max_us: AtomicU32,
}

/// Single-writer, multi-reader ledger mirror.
pub struct SharedLedger {
    cells: Box<[CachePadded<SlotCell>]>,
}

impl fmt::Debug for SharedLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLedger")
            .field("slots", &self.cells.len())
            .field("publications", &self.publications())
            .finish()
    }
}

impl SharedLedger {
    /// Create a mirror with `slot_count` unmeasured slots.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        let cells = (0..slot_count)
            .map(|_| CachePadded::new(SlotCell::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { cells }
    }

    /// Number of slots mirrored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the mirror has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Publish a slot record.
    ///
    /// **Called by: control thread only.** Concurrent writers to the same
    /// slot would break the sequence protocol.
    #[inline]
    pub fn publish(&self, slot: usize, measurement: RuntimeMeasurement) {
        let Some(cell) = self.cells.get(slot) else {
            return;
        };

        let seq = cell.sequence.load(Ordering::Relaxed);
        cell.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        cell.current_us.store(measurement.current_us, Ordering::Relaxed);
        cell.min_us.store(measurement.min_us, Ordering::Relaxed);
        cell.max_us.store(measurement.max_us, Ordering::Relaxed);

        cell.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read a consistent copy of one slot.
    ///
    /// Spins (with backoff) while the slot is being written.
    #[must_use]
    pub fn read(&self, slot: usize) -> Option<RuntimeMeasurement> {
        let cell = self.cells.get(slot)?;
        let backoff = Backoff::new();

        loop {
            let seq1 = cell.sequence.load(Ordering::Acquire);
            if seq1 & 1 == 0 {
                let measurement = RuntimeMeasurement {
                    current_us: cell.current_us.load(Ordering::Relaxed),
                    min_us: cell.min_us.load(Ordering::Relaxed),
                    max_us: cell.max_us.load(Ordering::Relaxed),
                };
                fence(Ordering::Acquire);
                let seq2 = cell.sequence.load(Ordering::Relaxed);
                if seq1 == seq2 {
                    return Some(measurement);
                }
            }
            backoff.snooze();
        }
    }

    /// Read every slot. Each slot is consistent on its own; slots are not
    /// captured at the same instant.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            slots: (0..self.cells.len()).filter_map(|slot| self.read(slot)).collect(),
        }
    }

    /// Total number of records published across all slots.
    #[must_use]
    pub fn publications(&self) -> u64 {
        self.cells
            .iter()
            .map(|cell| cell.sequence.load(Ordering::Relaxed) / 2)
            .sum()
    }
}
