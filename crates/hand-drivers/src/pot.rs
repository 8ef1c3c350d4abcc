//! Potentiometer input: the manual set-point for the hand.

use crate::bus::SignalBus;
use crate::filter::Smoother;
use crate::hal::AnalogInput;
use hand_common::error::HandResult;
use hand_runtime::registry::{Collaborator, DebugProbe};
use std::sync::Arc;
use tracing::{debug, trace};

/// Smoothed potentiometer reader.
pub struct Potentiometer<A: AnalogInput> {
    adc: A,
    bus: Arc<SignalBus>,
    filter: Smoother,
    raw: u16,
}

impl<A: AnalogInput> Potentiometer<A> {
    /// Create a reader smoothing with weight `1 / 2^smoothing_shift`.
    pub fn new(adc: A, bus: Arc<SignalBus>, smoothing_shift: u8) -> Self {
        Self {
            adc,
            bus,
            filter: Smoother::new(smoothing_shift),
            raw: 0,
        }
    }

    /// Last raw sample.
    #[must_use]
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// Current smoothed value.
    #[must_use]
    pub fn value(&self) -> u16 {
        self.filter.value()
    }
}

impl<A: AnalogInput> Collaborator for Potentiometer<A> {
    fn name(&self) -> &'static str {
        "pot"
    }

    fn init(&mut self) -> HandResult<()> {
        self.filter.reset();
        self.raw = self.adc.read_raw();
        let value = self.filter.update(self.raw);
        self.bus.set_potentiometer(value);
        debug!(value, "Potentiometer initialized");
        Ok(())
    }

    fn handle(&mut self) {
        self.raw = self.adc.read_raw();
        let value = self.filter.update(self.raw);
        self.bus.set_potentiometer(value);
        trace!(raw = self.raw, value, "Potentiometer sampled");
    }

    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        Some(Arc::new(PotProbe {
            bus: Arc::clone(&self.bus),
        }))
    }
}

struct PotProbe {
    bus: Arc<SignalBus>,
}

impl DebugProbe for PotProbe {
    fn name(&self) -> &str {
        "pot"
    }

    fn debug_dump(&self) -> String {
        format!("pot value: {}", self.bus.potentiometer())
    }
}
