//! Pump.fun instruction construction
//!
//! One [`Operation`] per wallet becomes the ordered instruction list that
//! wallet signs. Account order must match the program's expectations.

use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use super::program::{
    derive_associated_bonding_curve, derive_ata, derive_bonding_curve, derive_metadata,
    DISCRIMINATORS, EVENT_AUTHORITY, FEE_RECIPIENT, GLOBAL, MINT_AUTHORITY, MPL_TOKEN_METADATA,
    PUMP_PROGRAM_ID,
};
use crate::error::{Error, Result};

/// Metaplex limits on token metadata, in bytes
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_URI_LEN: usize = 200;

/// Closed set of actions a wallet can take in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create the mint and its bonding curve; the mint keypair must co-sign
    CreatePool {
        mint: Pubkey,
        name: String,
        symbol: String,
        uri: String,
    },
    Buy {
        mint: Pubkey,
        token_amount: u64,
        max_sol_cost: u64,
    },
    Sell {
        mint: Pubkey,
        token_amount: u64,
        min_sol_output: u64,
    },
}

/// Produces the instructions one wallet signs for an operation
pub trait InstructionBuilder: Send + Sync {
    fn build(&self, owner: &Pubkey, operation: &Operation) -> Result<Vec<Instruction>>;
}

#[derive(BorshSerialize)]
struct CreateArgs<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
}

#[derive(BorshSerialize)]
struct TradeArgs {
    amount: u64,
    sol_limit: u64,
}

/// Encodes pump.fun create / buy / sell instructions
#[derive(Debug, Default, Clone, Copy)]
pub struct PumpInstructionBuilder;

impl PumpInstructionBuilder {
    pub fn new() -> Self {
        Self
    }

    fn create(&self, owner: &Pubkey, mint: &Pubkey, name: &str, symbol: &str, uri: &str) -> Result<Instruction> {
        check_len("name", name, MAX_NAME_LEN)?;
        check_len("symbol", symbol, MAX_SYMBOL_LEN)?;
        check_len("uri", uri, MAX_URI_LEN)?;

        let data = encode(DISCRIMINATORS::CREATE, &CreateArgs { name, symbol, uri })?;

        Ok(Instruction {
            program_id: *PUMP_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*mint, true),                                      // mint (signer)
                AccountMeta::new_readonly(*MINT_AUTHORITY, false),                  // mint_authority
                AccountMeta::new(derive_bonding_curve(mint), false),                // bonding_curve
                AccountMeta::new(derive_associated_bonding_curve(mint), false),     // associated_bonding_curve
                AccountMeta::new_readonly(*GLOBAL, false),                          // global
                AccountMeta::new_readonly(*MPL_TOKEN_METADATA, false),              // mpl_token_metadata
                AccountMeta::new(derive_metadata(mint), false),                     // metadata
                AccountMeta::new(*owner, true),                                     // user (signer)
                AccountMeta::new_readonly(system_program::ID, false),               // system_program
                AccountMeta::new_readonly(spl_token::ID, false),                    // token_program
                AccountMeta::new_readonly(spl_associated_token_account::ID, false), // associated_token_program
                AccountMeta::new_readonly(sysvar::rent::ID, false),                 // rent
                AccountMeta::new_readonly(*EVENT_AUTHORITY, false),                 // event_authority
                AccountMeta::new_readonly(*PUMP_PROGRAM_ID, false),                 // program
            ],
            data,
        })
    }

    fn buy(&self, owner: &Pubkey, mint: &Pubkey, token_amount: u64, max_sol_cost: u64) -> Result<Vec<Instruction>> {
        if token_amount == 0 {
            return Err(Error::InvalidInstruction("buy amount must be positive".to_string()));
        }

        let data = encode(
            DISCRIMINATORS::BUY,
            &TradeArgs {
                amount: token_amount,
                sol_limit: max_sol_cost,
            },
        )?;

        // The buyer's token account may not exist yet
        let create_ata =
            create_associated_token_account_idempotent(owner, owner, mint, &spl_token::ID);

        let buy = Instruction {
            program_id: *PUMP_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new_readonly(*GLOBAL, false),                      // global
                AccountMeta::new(*FEE_RECIPIENT, false),                        // fee_recipient
                AccountMeta::new_readonly(*mint, false),                        // mint
                AccountMeta::new(derive_bonding_curve(mint), false),            // bonding_curve
                AccountMeta::new(derive_associated_bonding_curve(mint), false), // associated_bonding_curve
                AccountMeta::new(derive_ata(owner, mint), false),               // associated_user
                AccountMeta::new(*owner, true),                                 // user (signer)
                AccountMeta::new_readonly(system_program::ID, false),           // system_program
                AccountMeta::new_readonly(spl_token::ID, false),                // token_program
                AccountMeta::new_readonly(sysvar::rent::ID, false),             // rent
                AccountMeta::new_readonly(*EVENT_AUTHORITY, false),             // event_authority
                AccountMeta::new_readonly(*PUMP_PROGRAM_ID, false),             // program
            ],
            data,
        };

        Ok(vec![create_ata, buy])
    }

    fn sell(&self, owner: &Pubkey, mint: &Pubkey, token_amount: u64, min_sol_output: u64) -> Result<Instruction> {
        if token_amount == 0 {
            return Err(Error::InvalidInstruction("sell amount must be positive".to_string()));
        }

        let data = encode(
            DISCRIMINATORS::SELL,
            &TradeArgs {
                amount: token_amount,
                sol_limit: min_sol_output,
            },
        )?;

        Ok(Instruction {
            program_id: *PUMP_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new_readonly(*GLOBAL, false),                          // global
                AccountMeta::new(*FEE_RECIPIENT, false),                            // fee_recipient
                AccountMeta::new_readonly(*mint, false),                            // mint
                AccountMeta::new(derive_bonding_curve(mint), false),                // bonding_curve
                AccountMeta::new(derive_associated_bonding_curve(mint), false),     // associated_bonding_curve
                AccountMeta::new(derive_ata(owner, mint), false),                   // associated_user
                AccountMeta::new(*owner, true),                                     // user (signer)
                AccountMeta::new_readonly(system_program::ID, false),               // system_program
                AccountMeta::new_readonly(spl_associated_token_account::ID, false), // associated_token_program
                AccountMeta::new_readonly(spl_token::ID, false),                    // token_program
                AccountMeta::new_readonly(*EVENT_AUTHORITY, false),                 // event_authority
                AccountMeta::new_readonly(*PUMP_PROGRAM_ID, false),                 // program
            ],
            data,
        })
    }
}

impl InstructionBuilder for PumpInstructionBuilder {
    fn build(&self, owner: &Pubkey, operation: &Operation) -> Result<Vec<Instruction>> {
        match operation {
            Operation::CreatePool {
                mint,
                name,
                symbol,
                uri,
            } => Ok(vec![self.create(owner, mint, name, symbol, uri)?]),
            Operation::Buy {
                mint,
                token_amount,
                max_sol_cost,
            } => self.buy(owner, mint, *token_amount, *max_sol_cost),
            Operation::Sell {
                mint,
                token_amount,
                min_sol_output,
            } => Ok(vec![self.sell(owner, mint, *token_amount, *min_sol_output)?]),
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() || value.len() > max {
        return Err(Error::InvalidInstruction(format!(
            "token {} must be 1..={} bytes, got {}",
            field,
            max,
            value.len()
        )));
    }
    Ok(())
}

fn encode<T: BorshSerialize>(discriminator: [u8; 8], args: &T) -> Result<Vec<u8>> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| Error::Serialization(format!("Failed to encode instruction args: {}", e)))?;
    Ok(data)
}
