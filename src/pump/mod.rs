//! Pump.fun protocol module
//!
//! # WARNING: Protocol Instability
//! Pump.fun has historically changed program behavior without notice.
//! The constants and structures in this module may break silently.

pub mod accounts;
pub mod builder;
pub mod price;
pub mod program;

pub use accounts::BondingCurve;
pub use builder::{InstructionBuilder, Operation, PumpInstructionBuilder};
pub use program::{DISCRIMINATORS, PUMP_PROGRAM_ID};
