//! Pump.fun Bundler Library
//!
//! Builds multi-wallet pump.fun bundles and lands them atomically through the
//! Jito block engine.

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod pump;
pub mod rpc;
pub mod trading;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
