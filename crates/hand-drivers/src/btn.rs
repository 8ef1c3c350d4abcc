//! Four-button bank with counter-based debounce.
//!
//! A raw level that differs from the accepted state must be seen on
//! `debounce_samples` consecutive handles before the state flips. Any sample
//! that agrees with the accepted state resets the counter.

use crate::bus::{SignalBus, BUTTON_COUNT};
use crate::hal::DigitalInput;
use hand_common::error::{HandError, HandResult};
use hand_runtime::registry::{Collaborator, DebugProbe};
use std::sync::Arc;
use tracing::debug;

/// Debounced button bank.
pub struct Buttons<P: DigitalInput> {
    pins: [P; BUTTON_COUNT],
    bus: Arc<SignalBus>,
    debounce_samples: u8,
    states: [bool; BUTTON_COUNT],
    counters: [u8; BUTTON_COUNT],
}

impl<P: DigitalInput> Buttons<P> {
    /// Create the bank. Pins read high while pressed.
    pub fn new(pins: [P; BUTTON_COUNT], bus: Arc<SignalBus>, debounce_samples: u8) -> Self {
        Self {
            pins,
            bus,
            debounce_samples,
            states: [false; BUTTON_COUNT],
            counters: [0; BUTTON_COUNT],
        }
    }

    /// Accepted (debounced) states.
    #[must_use]
    pub fn states(&self) -> [bool; BUTTON_COUNT] {
        self.states
    }
}

impl<P: DigitalInput> Collaborator for Buttons<P> {
    fn name(&self) -> &'static str {
        "btn"
    }

    fn init(&mut self) -> HandResult<()> {
        if self.debounce_samples == 0 {
            return Err(HandError::Collaborator {
                name: self.name().into(),
                reason: "debounce_samples must be at least 1".into(),
            });
        }

        // Accept the power-on levels as-is
        for (i, pin) in self.pins.iter().enumerate() {
            self.states[i] = pin.is_high();
            self.counters[i] = 0;
            self.bus.set_button(i, self.states[i]);
        }
        debug!(states = ?self.states, "Buttons initialized");
        Ok(())
    }

    fn handle(&mut self) {
        for (i, pin) in self.pins.iter().enumerate() {
            let raw = pin.is_high();
            if raw == self.states[i] {
                self.counters[i] = 0;
                continue;
            }

            self.counters[i] += 1;
            if self.counters[i] >= self.debounce_samples {
                self.states[i] = raw;
                self.counters[i] = 0;
                self.bus.set_button(i, raw);
                debug!(button = i, pressed = raw, "Button state changed");
            }
        }
    }

    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        Some(Arc::new(ButtonsProbe {
            bus: Arc::clone(&self.bus),
        }))
    }
}

struct ButtonsProbe {
    bus: Arc<SignalBus>,
}

impl DebugProbe for ButtonsProbe {
    fn name(&self) -> &str {
        "btn"
    }

    fn debug_dump(&self) -> String {
        let states = self.bus.buttons().map(u8::from);
        format!("btn states: {states:?}")
    }
}
