//! Servo output: maps the selected 12-bit signal onto a pulse width.
//!
//! ```text
//! pulse = min + signal * (max - min) / 4095
//! ```
//!
//! With `inverted`, the signal is mirrored (`4095 - signal`) first.

use crate::bus::SignalBus;
use crate::hal::{PwmOutput, ADC_MAX};
use hand_common::config::ServoConfig;
use hand_common::error::{HandError, HandResult};
use hand_runtime::registry::{Collaborator, DebugProbe};
use std::sync::Arc;
use tracing::{debug, trace};

/// Hobby servo driven from the signal bus.
pub struct Servo<O: PwmOutput> {
    out: O,
    bus: Arc<SignalBus>,
    config: ServoConfig,
    last_pulse_us: Option<u16>,
}

impl<O: PwmOutput> Servo<O> {
    /// Create the servo driver.
    pub fn new(out: O, bus: Arc<SignalBus>, config: ServoConfig) -> Self {
        Self {
            out,
            bus,
            config,
            last_pulse_us: None,
        }
    }

    /// Pulse width for a 12-bit signal value.
    #[must_use]
    pub fn pulse_for(&self, signal: u16) -> u16 {
        map_pulse(&self.config, signal)
    }

    fn write(&mut self, pulse_us: u16) {
        if self.last_pulse_us == Some(pulse_us) {
            return;
        }
        self.out.set_pulse_us(pulse_us);
        self.bus.set_servo_pulse_us(pulse_us);
        self.last_pulse_us = Some(pulse_us);
    }
}

/// Linear signal to pulse mapping.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn map_pulse(config: &ServoConfig, signal: u16) -> u16 {
    let signal = signal.min(ADC_MAX);
    let signal = if config.inverted { ADC_MAX - signal } else { signal };
    let span = u32::from(config.max_pulse_us.saturating_sub(config.min_pulse_us));
    let offset = u32::from(signal) * span / u32::from(ADC_MAX);
    // offset <= span <= u16::MAX
    config.min_pulse_us + offset as u16
}

impl<O: PwmOutput> Collaborator for Servo<O> {
    fn name(&self) -> &'static str {
        "srv"
    }

    fn init(&mut self) -> HandResult<()> {
        if self.config.min_pulse_us >= self.config.max_pulse_us {
            return Err(HandError::Collaborator {
                name: self.name().into(),
                reason: format!(
                    "min_pulse_us {} must be below max_pulse_us {}",
                    self.config.min_pulse_us, self.config.max_pulse_us
                ),
            });
        }

        let pulse_us = self.pulse_for(self.bus.selected_signal());
        self.last_pulse_us = None;
        self.write(pulse_us);
        debug!(pulse_us, "Servo initialized");
        Ok(())
    }

    fn handle(&mut self) {
        let signal = self.bus.selected_signal();
        let pulse_us = self.pulse_for(signal);
        self.write(pulse_us);
        trace!(signal, pulse_us, "Servo updated");
    }

    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        Some(Arc::new(ServoProbe {
            bus: Arc::clone(&self.bus),
        }))
    }
}

struct ServoProbe {
    bus: Arc<SignalBus>,
}

impl DebugProbe for ServoProbe {
    fn name(&self) -> &str {
        "srv"
    }

    fn debug_dump(&self) -> String {
        format!(
            "srv pulse: {}us (source: {})",
            self.bus.servo_pulse_us(),
            self.bus.signal_source()
        )
    }
}
