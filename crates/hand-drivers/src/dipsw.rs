//! DIP switch: board configuration read once at startup.
//!
//! Switch 1 selects the servo signal source (off = potentiometer, on =
//! muscle sensor). The switch is not bound to a slot; changing it takes
//! effect on the next boot.

use crate::bus::SignalBus;
use crate::hal::DigitalInput;
use hand_common::config::SignalSource;
use std::sync::Arc;
use tracing::info;

/// Signal-source selector.
pub struct DipSwitch<P: DigitalInput> {
    source_pin: P,
    override_source: Option<SignalSource>,
    bus: Arc<SignalBus>,
}

impl<P: DigitalInput> DipSwitch<P> {
    /// Create the selector. `override_source`, when set, wins over the switch.
    pub fn new(source_pin: P, override_source: Option<SignalSource>, bus: Arc<SignalBus>) -> Self {
        Self {
            source_pin,
            override_source,
            bus,
        }
    }

    /// Read the switch, publish the selected source and return it.
    pub fn read_config(&self) -> SignalSource {
        let switch = if self.source_pin.is_high() {
            SignalSource::Sensor
        } else {
            SignalSource::Potentiometer
        };

        let source = match self.override_source {
            Some(forced) if forced != switch => {
                info!(%switch, %forced, "Signal source overridden by configuration");
                forced
            }
            Some(forced) => forced,
            None => switch,
        };

        self.bus.set_signal_source(source);
        info!(%source, "Signal source selected");
        source
    }
}
