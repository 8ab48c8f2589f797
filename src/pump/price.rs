//! Amount conversions and slippage bounds

use crate::error::{Error, Result};

/// SOL decimals (lamports)
pub const SOL_DECIMALS: u8 = 9;

const BPS_DENOMINATOR: u128 = 10_000;

/// Maximum SOL to spend for a buy with slippage
pub fn max_sol_with_slippage(expected_sol: u64, slippage_bps: u32) -> Result<u64> {
    let bounded = expected_sol as u128 * (BPS_DENOMINATOR + slippage_bps as u128) / BPS_DENOMINATOR;
    u64::try_from(bounded).map_err(|_| Error::PriceOverflow)
}

/// Minimum SOL to receive for a sell with slippage
pub fn min_sol_with_slippage(expected_sol: u64, slippage_bps: u32) -> u64 {
    let factor = BPS_DENOMINATOR.saturating_sub(slippage_bps as u128);
    (expected_sol as u128 * factor / BPS_DENOMINATOR) as u64
}

/// `pct` percent of `amount`, rounded down
pub fn percent_of(amount: u64, pct: u8) -> u64 {
    (amount as u128 * pct.min(100) as u128 / 100) as u64
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 10f64.powi(SOL_DECIMALS as i32)
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * 10f64.powi(SOL_DECIMALS as i32)) as u64
}

/// Convert token amount to human-readable (with decimals)
pub fn tokens_to_human(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}
