//! Peripheral drivers for the prosthetic hand.
//!
//! This crate provides:
//! - [`hal`] traits for digital inputs, ADC channels and PWM outputs, plus
//!   simulated backends
//! - [`SignalBus`] carrying values between collaborators
//! - the collaborators bound into task slots: [`Buttons`], [`Potentiometer`],
//!   [`Sensor`] and [`Servo`]
//! - [`DipSwitch`], read once at startup to pick the servo signal source
//! - [`Peripherals::compose`], which builds the task registry from the
//!   configured slot layout

pub mod board;
pub mod btn;
pub mod bus;
pub mod dipsw;
pub mod filter;
pub mod hal;
pub mod pot;
pub mod sensor;
pub mod srv;

pub use board::*;
pub use btn::Buttons;
pub use bus::*;
pub use dipsw::DipSwitch;
pub use filter::Smoother;
pub use hal::*;
pub use pot::Potentiometer;
pub use sensor::Sensor;
pub use srv::{map_pulse, Servo};
