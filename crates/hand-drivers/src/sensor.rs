//! Muscle (EMG) sensor input.
//!
//! Same sampling path as the potentiometer, but the sensor can be released
//! with [`Sensor::deinit`] when it is not the selected signal source. A
//! released sensor keeps its slot but stops sampling and publishes zero.

use crate::bus::SignalBus;
use crate::filter::Smoother;
use crate::hal::AnalogInput;
use hand_common::error::HandResult;
use hand_runtime::registry::{Collaborator, DebugProbe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Smoothed muscle sensor reader.
pub struct Sensor<A: AnalogInput> {
    adc: A,
    bus: Arc<SignalBus>,
    filter: Smoother,
    active: Arc<AtomicBool>,
}

impl<A: AnalogInput> Sensor<A> {
    /// Create a reader smoothing with weight `1 / 2^smoothing_shift`.
    pub fn new(adc: A, bus: Arc<SignalBus>, smoothing_shift: u8) -> Self {
        Self {
            adc,
            bus,
            filter: Smoother::new(smoothing_shift),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the sensor is initialized and sampling.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Stop sampling and publish zero. [`Collaborator::init`] re-activates.
    pub fn deinit(&mut self) {
        if self.active.swap(false, Ordering::Relaxed) {
            self.filter.reset();
            self.bus.set_sensor(0);
            info!("Sensor released");
        }
    }
}

impl<A: AnalogInput> Collaborator for Sensor<A> {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn init(&mut self) -> HandResult<()> {
        self.filter.reset();
        let value = self.filter.update(self.adc.read_raw());
        self.bus.set_sensor(value);
        self.active.store(true, Ordering::Relaxed);
        debug!(value, "Sensor initialized");
        Ok(())
    }

    fn handle(&mut self) {
        if !self.is_active() {
            return;
        }
        let raw = self.adc.read_raw();
        let value = self.filter.update(raw);
        self.bus.set_sensor(value);
        trace!(raw, value, "Sensor sampled");
    }

    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        Some(Arc::new(SensorProbe {
            bus: Arc::clone(&self.bus),
            active: Arc::clone(&self.active),
        }))
    }
}

struct SensorProbe {
    bus: Arc<SignalBus>,
    active: Arc<AtomicBool>,
}

impl DebugProbe for SensorProbe {
    fn name(&self) -> &str {
        "sensor"
    }

    fn debug_dump(&self) -> String {
        if self.active.load(Ordering::Relaxed) {
            format!("sensor value: {}", self.bus.sensor())
        } else {
            "sensor value: - (released)".to_owned()
        }
    }
}
