//! Pump.fun program constants, discriminators and PDA derivation
//!
//! # WARNING: These constants may change without notice
//! Pump.fun has historically modified their program behavior.
//! If transactions start failing, these values may need to be updated.
//!
//! # How discriminators are calculated
//! Anchor uses the first 8 bytes of SHA-256("global:<instruction_name>")
//! as the instruction discriminator.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Pump.fun program ID
pub const PUMP_PROGRAM_ID_STR: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

lazy_static::lazy_static! {
    /// Pump.fun program ID as Pubkey
    pub static ref PUMP_PROGRAM_ID: Pubkey =
        Pubkey::from_str(PUMP_PROGRAM_ID_STR).expect("Invalid pump program ID");

    /// Global config account
    pub static ref GLOBAL: Pubkey =
        Pubkey::from_str("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf").expect("Invalid global account");

    /// Protocol fee recipient
    pub static ref FEE_RECIPIENT: Pubkey =
        Pubkey::from_str("CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM").expect("Invalid fee recipient");

    /// Anchor event authority PDA
    pub static ref EVENT_AUTHORITY: Pubkey =
        Pubkey::from_str("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1").expect("Invalid event authority");

    /// Mint authority every pump.fun mint is created with
    pub static ref MINT_AUTHORITY: Pubkey =
        Pubkey::from_str("TSLvdd1pWpHVjahSpsvCXUbgwsL3JAcvokwaKt1eokM").expect("Invalid mint authority");

    /// Metaplex token metadata program
    pub static ref MPL_TOKEN_METADATA: Pubkey =
        Pubkey::from_str("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s").expect("Invalid metadata program");
}

/// Instruction discriminators (first 8 bytes of instruction data)
/// Calculated as: SHA-256("global:<instruction_name>")[0..8]
#[allow(non_snake_case)]
pub mod DISCRIMINATORS {
    /// SHA-256("global:create")[0..8]
    pub const CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];

    /// SHA-256("global:buy")[0..8]
    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];

    /// SHA-256("global:sell")[0..8]
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
}

/// Account discriminators (first 8 bytes of account data)
#[allow(non_snake_case)]
pub mod ACCOUNT_DISCRIMINATORS {
    /// SHA-256("account:BondingCurve")[0..8]
    pub const BONDING_CURVE: [u8; 8] = [23, 183, 248, 55, 96, 216, 172, 96];
}

/// Calculate instruction discriminator from name
/// This follows Anchor's convention: SHA-256("global:<name>")[0..8]
pub fn calculate_discriminator(name: &str) -> [u8; 8] {
    use sha2::{Digest, Sha256};

    let preimage = format!("global:{}", name);
    let hash = Sha256::digest(preimage.as_bytes());

    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Bonding curve PDA for a mint
pub fn derive_bonding_curve(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"bonding-curve", mint.as_ref()], &PUMP_PROGRAM_ID).0
}

/// Token account holding the curve's token reserves
pub fn derive_associated_bonding_curve(mint: &Pubkey) -> Pubkey {
    derive_ata(&derive_bonding_curve(mint), mint)
}

/// Metaplex metadata PDA for a mint
pub fn derive_metadata(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", MPL_TOKEN_METADATA.as_ref(), mint.as_ref()],
        &MPL_TOKEN_METADATA,
    )
    .0
}

/// Derive associated token account address
pub fn derive_ata(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}
