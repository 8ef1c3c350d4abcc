#![doc = "Control core for the prosthetic hand: cycle scheduler, task registry and runtime measurement."]

pub mod clock;
pub mod realtime;
pub mod registry;
pub mod scheduler;
pub mod shared_ledger;

pub use clock::*;
pub use realtime::*;
pub use registry::*;
pub use scheduler::*;
pub use shared_ledger::*;
