//! Pump.fun bonding curve state and constant-product math
//!
//! # WARNING: This layout may change without notice
//! If deserialization fails, the structure may need updating.

use borsh::{BorshDeserialize, BorshSerialize};

use super::program::ACCOUNT_DISCRIMINATORS;
use crate::error::{Error, Result};

/// Virtual SOL reserves of a freshly created curve (30 SOL)
pub const INITIAL_VIRTUAL_SOL_RESERVES: u64 = 30_000_000_000;

/// Virtual token reserves of a freshly created curve
pub const INITIAL_VIRTUAL_TOKEN_RESERVES: u64 = 1_073_000_000_000_000;

/// Real token reserves available for sale on a fresh curve
pub const INITIAL_REAL_TOKEN_RESERVES: u64 = 793_100_000_000_000;

/// Total supply minted at creation
pub const TOKEN_TOTAL_SUPPLY: u64 = 1_000_000_000_000_000;

/// BondingCurve account - stores the bonding curve state for a token
#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BondingCurve {
    _discriminator: [u8; 8],

    /// Virtual SOL reserves for price calculation
    pub virtual_sol_reserves: u64,

    /// Virtual token reserves for price calculation
    pub virtual_token_reserves: u64,

    /// Real SOL reserves (actual SOL held in bonding curve)
    pub real_sol_reserves: u64,

    /// Real token reserves (actual tokens held in bonding curve)
    pub real_token_reserves: u64,

    pub token_total_supply: u64,

    /// Whether the bonding curve is complete (migrated)
    pub complete: bool,
}

impl BondingCurve {
    /// State of a curve right after `create`, before any buy
    ///
    /// Launch bundles quote against this because the pool does not exist yet
    /// when the bundle is assembled.
    pub fn initial() -> Self {
        Self {
            _discriminator: ACCOUNT_DISCRIMINATORS::BONDING_CURVE,
            virtual_sol_reserves: INITIAL_VIRTUAL_SOL_RESERVES,
            virtual_token_reserves: INITIAL_VIRTUAL_TOKEN_RESERVES,
            real_sol_reserves: 0,
            real_token_reserves: INITIAL_REAL_TOKEN_RESERVES,
            token_total_supply: TOKEN_TOTAL_SUPPLY,
            complete: false,
        }
    }

    /// Deserialize from account data
    pub fn try_from_slice(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Serialization(
                "Bonding curve account data too short".to_string(),
            ));
        }

        if data[..8] != ACCOUNT_DISCRIMINATORS::BONDING_CURVE {
            return Err(Error::Serialization(format!(
                "Wrong bonding curve discriminator: got {:?}",
                &data[..8]
            )));
        }

        // Newer curves carry trailing fields; decode the known prefix only
        let mut reader = data;
        BorshDeserialize::deserialize(&mut reader)
            .map_err(|e| Error::Serialization(format!("Borsh decode failed: {}", e)))
    }

    /// Spot price in lamports per token unit
    pub fn get_price(&self) -> Result<f64> {
        if self.virtual_token_reserves == 0 {
            return Err(Error::PriceOverflow);
        }

        Ok(self.virtual_sol_reserves as f64 / self.virtual_token_reserves as f64)
    }

    /// Calculate how many tokens you get for a given SOL amount
    /// Uses constant product formula: x * y = k
    pub fn calculate_buy_tokens(&self, sol_amount: u64) -> Result<u64> {
        if self.virtual_sol_reserves == 0 || self.virtual_token_reserves == 0 {
            return Err(Error::PriceOverflow);
        }

        let new_sol_reserves = self
            .virtual_sol_reserves
            .checked_add(sol_amount)
            .ok_or(Error::PriceOverflow)?;

        let k = (self.virtual_sol_reserves as u128)
            .checked_mul(self.virtual_token_reserves as u128)
            .ok_or(Error::PriceOverflow)?;

        let new_token_reserves = k
            .checked_div(new_sol_reserves as u128)
            .ok_or(Error::PriceOverflow)?;

        let tokens_out = (self.virtual_token_reserves as u128)
            .checked_sub(new_token_reserves)
            .ok_or(Error::PriceOverflow)?;

        // The curve never hands out more than it really holds
        Ok((tokens_out as u64).min(self.real_token_reserves))
    }

    /// Calculate how much SOL you get for selling tokens
    pub fn calculate_sell_sol(&self, token_amount: u64) -> Result<u64> {
        if self.virtual_sol_reserves == 0 || self.virtual_token_reserves == 0 {
            return Err(Error::PriceOverflow);
        }

        let new_token_reserves = self
            .virtual_token_reserves
            .checked_add(token_amount)
            .ok_or(Error::PriceOverflow)?;

        let k = (self.virtual_sol_reserves as u128)
            .checked_mul(self.virtual_token_reserves as u128)
            .ok_or(Error::PriceOverflow)?;

        let new_sol_reserves = k
            .checked_div(new_token_reserves as u128)
            .ok_or(Error::PriceOverflow)?;

        let sol_out = (self.virtual_sol_reserves as u128)
            .checked_sub(new_sol_reserves)
            .ok_or(Error::PriceOverflow)?;

        Ok(sol_out as u64)
    }

    /// Curve state after a buy of `sol_amount` lamports for `tokens` units
    ///
    /// Used to quote buys that execute one after another in a bundle.
    pub fn apply_buy(&self, sol_amount: u64, tokens: u64) -> Result<Self> {
        Ok(Self {
            virtual_sol_reserves: self
                .virtual_sol_reserves
                .checked_add(sol_amount)
                .ok_or(Error::PriceOverflow)?,
            virtual_token_reserves: self
                .virtual_token_reserves
                .checked_sub(tokens)
                .ok_or(Error::PriceOverflow)?,
            real_sol_reserves: self
                .real_sol_reserves
                .checked_add(sol_amount)
                .ok_or(Error::PriceOverflow)?,
            real_token_reserves: self
                .real_token_reserves
                .checked_sub(tokens)
                .ok_or(Error::PriceOverflow)?,
            ..self.clone()
        })
    }

    /// Curve state after selling `tokens` units for `sol_amount` lamports
    pub fn apply_sell(&self, tokens: u64, sol_amount: u64) -> Result<Self> {
        Ok(Self {
            virtual_sol_reserves: self
                .virtual_sol_reserves
                .checked_sub(sol_amount)
                .ok_or(Error::PriceOverflow)?,
            virtual_token_reserves: self
                .virtual_token_reserves
                .checked_add(tokens)
                .ok_or(Error::PriceOverflow)?,
            real_sol_reserves: self.real_sol_reserves.saturating_sub(sol_amount),
            real_token_reserves: self
                .real_token_reserves
                .checked_add(tokens)
                .ok_or(Error::PriceOverflow)?,
            ..self.clone()
        })
    }
}
