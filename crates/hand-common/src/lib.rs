#![doc = "Common types shared across the prosthetic hand workspace."]

pub mod config;
pub mod error;
pub mod ledger;
pub mod state;

pub use config::*;
pub use error::*;
pub use ledger::*;
pub use state::*;
