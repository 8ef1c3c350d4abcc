//! Minimal hardware abstraction for the hand's peripherals.
//!
//! Drivers are generic over these traits so the same collaborator code runs
//! against real GPIO/ADC/PWM backends or the simulated ones below.

#[cfg(feature = "simulated")]
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
#[cfg(feature = "simulated")]
use std::sync::Arc;

/// Largest value a 12-bit ADC sample can take.
pub const ADC_MAX: u16 = 4095;

/// Digital input pin.
pub trait DigitalInput: Send {
    /// Current logic level.
    fn is_high(&self) -> bool;
}

/// 12-bit analog input channel.
pub trait AnalogInput: Send {
    /// Take one sample. Values above [`ADC_MAX`] are clamped by callers.
    fn read_raw(&mut self) -> u16;
}

/// PWM output driving a hobby servo.
pub trait PwmOutput: Send {
    /// Set the high time of each period in microseconds.
    fn set_pulse_us(&mut self, pulse_us: u16);
}

/// Simulated digital pin. Clones share the same level.
#[cfg(feature = "simulated")]
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

#[cfg(feature = "simulated")]
impl SimPin {
    /// Create a pin at the given level.
    #[must_use]
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    /// Drive the pin level.
    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

#[cfg(feature = "simulated")]
impl DigitalInput for SimPin {
    fn is_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

/// Simulated ADC channel. Clones share the same value.
#[cfg(feature = "simulated")]
#[derive(Debug, Clone, Default)]
pub struct SimAnalog {
    value: Arc<AtomicU16>,
    samples: Arc<AtomicU64>,
}

#[cfg(feature = "simulated")]
impl SimAnalog {
    /// Create a channel reading `value`.
    #[must_use]
    pub fn new(value: u16) -> Self {
        let channel = Self::default();
        channel.set(value);
        channel
    }

    /// Set the value returned by the next samples, clamped to 12 bits.
    pub fn set(&self, value: u16) {
        self.value.store(value.min(ADC_MAX), Ordering::Relaxed);
    }

    /// Number of samples taken so far.
    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "simulated")]
impl AnalogInput for SimAnalog {
    fn read_raw(&mut self) -> u16 {
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.value.load(Ordering::Relaxed)
    }
}

/// Simulated PWM output. Clones share the same state.
#[cfg(feature = "simulated")]
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    pulse_us: Arc<AtomicU16>,
    writes: Arc<AtomicU64>,
}

#[cfg(feature = "simulated")]
impl SimPwm {
    /// Create an output with no pulse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last pulse width written.
    #[must_use]
    pub fn pulse_us(&self) -> u16 {
        self.pulse_us.load(Ordering::Relaxed)
    }

    /// Number of writes so far.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "simulated")]
impl PwmOutput for SimPwm {
    fn set_pulse_us(&mut self, pulse_us: u16) {
        self.pulse_us.store(pulse_us, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}
