//! Board wiring: turns the configured slot layout into a task registry.

use crate::btn::Buttons;
use crate::bus::{SignalBus, BUTTON_COUNT};
use crate::dipsw::DipSwitch;
use crate::hal::{AnalogInput, DigitalInput, PwmOutput};
use crate::pot::Potentiometer;
use crate::sensor::Sensor;
use crate::srv::Servo;
use hand_common::config::{HandConfig, SignalSource, TaskKind};
use hand_common::error::HandResult;
use hand_runtime::registry::{Collaborator, TaskRegistry};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "simulated")]
use crate::hal::{SimAnalog, SimPin, SimPwm};

/// Peripheral handles of one board.
///
/// Handles are cloned into each collaborator that needs them.
#[derive(Debug, Clone)]
pub struct Peripherals<P, A, O> {
    /// Button inputs.
    pub buttons: [P; BUTTON_COUNT],
    /// Potentiometer ADC channel.
    pub potentiometer: A,
    /// Muscle sensor ADC channel.
    pub sensor: A,
    /// DIP switch signal-source pin.
    pub dip_source: P,
    /// Servo PWM output.
    pub servo: O,
}

/// Simulated board, driven through the shared handles.
#[cfg(feature = "simulated")]
pub type SimBoard = Peripherals<SimPin, SimAnalog, SimPwm>;

#[cfg(feature = "simulated")]
impl Default for SimBoard {
    fn default() -> Self {
        Self {
            buttons: Default::default(),
            potentiometer: SimAnalog::default(),
            sensor: SimAnalog::default(),
            dip_source: SimPin::default(),
            servo: SimPwm::default(),
        }
    }
}

impl<P, A, O> Peripherals<P, A, O>
where
    P: DigitalInput + Clone + 'static,
    A: AnalogInput + Clone + 'static,
    O: PwmOutput + Clone + 'static,
{
    /// Read the DIP switch, initialize one collaborator per configured slot
    /// and bind them in slot order.
    ///
    /// The sensor is released right after init when the potentiometer is the
    /// selected signal source.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator init failure.
    pub fn compose(&self, config: &HandConfig, bus: &Arc<SignalBus>) -> HandResult<TaskRegistry> {
        let drivers = &config.drivers;
        let source = DipSwitch::new(self.dip_source.clone(), drivers.signal_source, Arc::clone(bus)).read_config();

        let mut registry = TaskRegistry::with_capacity(config.tasks.slots.len());
        for (slot, kind) in config.tasks.slots.iter().enumerate() {
            match kind {
                TaskKind::Buttons => {
                    let btn = Buttons::new(self.buttons.clone(), Arc::clone(bus), drivers.debounce_samples);
                    registry.push_collaborator(init(slot, btn)?);
                }
                TaskKind::Potentiometer => {
                    let pot = Potentiometer::new(self.potentiometer.clone(), Arc::clone(bus), drivers.smoothing_shift);
                    registry.push_collaborator(init(slot, pot)?);
                }
                TaskKind::Sensor => {
                    let mut sensor = init(
                        slot,
                        Sensor::new(self.sensor.clone(), Arc::clone(bus), drivers.smoothing_shift),
                    )?;
                    if source != SignalSource::Sensor {
                        sensor.deinit();
                    }
                    registry.push_collaborator(sensor);
                }
                TaskKind::Servo => {
                    let srv = Servo::new(self.servo.clone(), Arc::clone(bus), drivers.servo);
                    registry.push_collaborator(init(slot, srv)?);
                }
                TaskKind::Idle => {
                    registry.push_idle();
                }
            }
        }

        info!(slots = registry.len(), %source, "Collaborators bound");
        Ok(registry)
    }
}

fn init<C: Collaborator>(slot: usize, mut collaborator: C) -> HandResult<C> {
    match collaborator.init() {
        Ok(()) => {
            info!(slot, name = collaborator.name(), "Collaborator initialized");
            Ok(collaborator)
        }
        Err(e) => {
            error!(slot, name = collaborator.name(), error = %e, "Collaborator init failed");
            Err(e)
        }
    }
}
