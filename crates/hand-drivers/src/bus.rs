//! Signal bus shared between collaborators and the reporter.
//!
//! The program owns one bus and hands clones of its `Arc` to every driver.
//! Each value has exactly one writing collaborator; everything else reads.

use hand_common::config::SignalSource;
use serde::Serialize;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

/// Number of buttons on the hand.
pub const BUTTON_COUNT: usize = 4;

/// Latest values produced by the collaborators.
#[derive(Debug, Default)]
pub struct SignalBus {
    buttons: AtomicU8,
    potentiometer: AtomicU16,
    sensor: AtomicU16,
    signal_source: AtomicU8,
    servo_pulse_us: AtomicU16,
}

/// Point-in-time copy of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusSnapshot {
    /// Debounced button states.
    pub buttons: [bool; BUTTON_COUNT],
    /// Smoothed potentiometer value.
    pub potentiometer: u16,
    /// Smoothed sensor value.
    pub sensor: u16,
    /// Signal driving the servo.
    pub signal_source: SignalSource,
    /// Last servo pulse width.
    pub servo_pulse_us: u16,
}

impl SignalBus {
    /// Create a bus with everything released and zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a debounced button state. Out-of-range indices are ignored.
    pub fn set_button(&self, index: usize, pressed: bool) {
        if index >= BUTTON_COUNT {
            return;
        }
        let mask = 1u8 << index;
        if pressed {
            self.buttons.fetch_or(mask, Ordering::Relaxed);
        } else {
            self.buttons.fetch_and(!mask, Ordering::Relaxed);
        }
    }

    /// Debounced state of one button.
    #[must_use]
    pub fn button(&self, index: usize) -> bool {
        index < BUTTON_COUNT && self.buttons.load(Ordering::Relaxed) & (1 << index) != 0
    }

    /// Debounced states of all buttons.
    #[must_use]
    pub fn buttons(&self) -> [bool; BUTTON_COUNT] {
        let bits = self.buttons.load(Ordering::Relaxed);
        std::array::from_fn(|i| bits & (1 << i) != 0)
    }

    /// Publish the smoothed potentiometer value.
    pub fn set_potentiometer(&self, value: u16) {
        self.potentiometer.store(value, Ordering::Relaxed);
    }

    /// Smoothed potentiometer value.
    #[must_use]
    pub fn potentiometer(&self) -> u16 {
        self.potentiometer.load(Ordering::Relaxed)
    }

    /// Publish the smoothed sensor value.
    pub fn set_sensor(&self, value: u16) {
        self.sensor.store(value, Ordering::Relaxed);
    }

    /// Smoothed sensor value.
    #[must_use]
    pub fn sensor(&self) -> u16 {
        self.sensor.load(Ordering::Relaxed)
    }

    /// Select the input that drives the servo.
    pub fn set_signal_source(&self, source: SignalSource) {
        let raw = match source {
            SignalSource::Potentiometer => 0,
            SignalSource::Sensor => 1,
        };
        self.signal_source.store(raw, Ordering::Relaxed);
    }

    /// Input that drives the servo.
    #[must_use]
    pub fn signal_source(&self) -> SignalSource {
        match self.signal_source.load(Ordering::Relaxed) {
            1 => SignalSource::Sensor,
            _ => SignalSource::Potentiometer,
        }
    }

    /// Value of whichever input currently drives the servo.
    #[must_use]
    pub fn selected_signal(&self) -> u16 {
        match self.signal_source() {
            SignalSource::Potentiometer => self.potentiometer(),
            SignalSource::Sensor => self.sensor(),
        }
    }

    /// Publish the pulse width last written to the servo.
    pub fn set_servo_pulse_us(&self, pulse_us: u16) {
        self.servo_pulse_us.store(pulse_us, Ordering::Relaxed);
    }

    /// Pulse width last written to the servo.
    #[must_use]
    pub fn servo_pulse_us(&self) -> u16 {
        self.servo_pulse_us.load(Ordering::Relaxed)
    }

    /// Copy every value. Fields are read one by one, not atomically as a group.
    #[must_use]
    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            buttons: self.buttons(),
            potentiometer: self.potentiometer(),
            sensor: self.sensor(),
            signal_source: self.signal_source(),
            servo_pulse_us: self.servo_pulse_us(),
        }
    }
}
