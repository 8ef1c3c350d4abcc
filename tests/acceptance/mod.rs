//! Integration tests for the prosthetic hand controller.

mod common;
mod config_test;
mod drivers_test;
mod ledger_test;
mod scheduling_test;
