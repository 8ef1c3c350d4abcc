//! Exponential smoothing for 12-bit ADC samples.

use crate::hal::ADC_MAX;

/// Integer exponential moving average with weight `1 / 2^shift`.
///
/// The accumulator holds the average scaled by `2^shift`, so a constant
/// input converges to exactly that input. The first sample primes the
/// filter. A shift of 0 passes samples through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smoother {
    shift: u8,
    acc: u32,
    primed: bool,
}

impl Smoother {
    /// Largest supported shift for 12-bit samples in a `u32` accumulator.
    pub const MAX_SHIFT: u8 = 15;

    /// Create a filter. Shifts above [`Self::MAX_SHIFT`] are clamped.
    #[must_use]
    pub fn new(shift: u8) -> Self {
        Self {
            shift: shift.min(Self::MAX_SHIFT),
            acc: 0,
            primed: false,
        }
    }

    /// Feed one sample (clamped to 12 bits) and return the smoothed value.
    pub fn update(&mut self, sample: u16) -> u16 {
        let sample = u32::from(sample.min(ADC_MAX));
        if self.primed {
            self.acc = self.acc - (self.acc >> self.shift) + sample;
        } else {
            self.acc = sample << self.shift;
            self.primed = true;
        }
        self.value()
    }

    /// Current smoothed value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn value(&self) -> u16 {
        (self.acc >> self.shift) as u16
    }

    /// Forget history; the next sample primes the filter again.
    pub fn reset(&mut self) {
        self.acc = 0;
        self.primed = false;
    }
}
