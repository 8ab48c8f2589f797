//! Wallet module - keypairs that sign bundle transactions

pub mod store;

pub use store::{NamedWallet, WalletStore};
