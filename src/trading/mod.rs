//! Trading module - bundle construction and submission
//!
//! - `fees`: compute-unit price per tier, tip account per network
//! - `assembler`: per-wallet instruction sets -> signed bundle
//! - `jito`: block engine relay transport
//! - `submitter`: retry / confirmation state machine

pub mod assembler;
pub mod bundle;
pub mod fees;
pub mod jito;
pub mod submitter;

pub use assembler::BundleAssembler;
pub use bundle::{Bundle, WalletInstructionSet};
pub use fees::{FeeStrategy, FeeTier, Network, TipAccount};
pub use jito::{BundleStatus, JitoRelay, RelayResponse, RelayTransport};
pub use submitter::{
    AttemptOutcome, BundleSubmitter, RejectReason, SubmissionAttempt, SubmissionOutcome,
    SubmissionResult, SubmitterSettings,
};
