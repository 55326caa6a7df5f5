//! Transaction Builder
//!
//! Builds swap transactions against the configured router program with the
//! compute-budget prefix carrying the priority fee.
//!
//! Note: this is a simplified instruction encoding. A production build
//! would pull account metas from the router's quote response.

use anyhow::{Context, Result};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::Message,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use std::str::FromStr;

use crate::utils::types::{TradeIntent, TradeSide};

/// Default compute units for a swap
const COMPUTE_UNITS: u32 = 400_000;

/// Router swap instruction discriminator
const SWAP_DISCRIMINATOR: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];

pub struct TransactionBuilder {
    swap_program_id: Pubkey,
    compute_units: u32,
}

impl TransactionBuilder {
    pub fn new(swap_program_id: &str) -> Result<Self> {
        let swap_program_id =
            Pubkey::from_str(swap_program_id).context("Invalid swap program ID")?;
        Ok(Self {
            swap_program_id,
            compute_units: COMPUTE_UNITS,
        })
    }

    /// Compute-budget prefix: unit limit + unit price (the priority fee).
    pub fn build_priority_fee_ix(&self, priority_fee: u64) -> Vec<Instruction> {
        vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.compute_units),
            ComputeBudgetInstruction::set_compute_unit_price(priority_fee),
        ]
    }

    /// Swap instruction for a trade intent. Amounts are denominated in the
    /// token's base units; `min_out` encodes the slippage floor.
    pub fn build_swap_ix(&self, payer: &Pubkey, intent: &TradeIntent) -> Result<Instruction> {
        let token_mint =
            Pubkey::from_str(&intent.token_address).context("Invalid token mint")?;

        let amount = (intent.amount * 1e9) as u64;
        let slippage_floor = 1.0 - intent.slippage_pct / 100.0;
        let min_out = (intent.amount * slippage_floor.max(0.0) * 1e9) as u64;

        let mut data = Vec::with_capacity(8 + 8 + 8 + 1);
        data.extend_from_slice(&SWAP_DISCRIMINATOR);
        data.extend_from_slice(&amount.to_le_bytes());
        data.extend_from_slice(&min_out.to_le_bytes());
        data.push(match intent.side {
            TradeSide::Buy => 0,
            TradeSide::Sell => 1,
        });

        Ok(Instruction {
            program_id: self.swap_program_id,
            accounts: vec![
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(token_mint, false),
            ],
            data,
        })
    }

    /// Full signed transaction for one intent.
    pub fn build_swap_transaction(
        &self,
        payer: &Keypair,
        intent: &TradeIntent,
        priority_fee: u64,
        blockhash: Hash,
    ) -> Result<Transaction> {
        let mut instructions = self.build_priority_fee_ix(priority_fee);
        instructions.push(self.build_swap_ix(&payer.pubkey(), intent)?);

        let message = Message::new(&instructions, Some(&payer.pubkey()));
        let mut tx = Transaction::new_unsigned(message);
        tx.sign(&[payer], blockhash);
        Ok(tx)
    }

    /// One transaction per intent, all against the same blockhash, for
    /// atomic bundle submission.
    pub fn build_bundle(
        &self,
        payer: &Keypair,
        intents: &[TradeIntent],
        priority_fee: u64,
        blockhash: Hash,
    ) -> Result<Vec<Transaction>> {
        intents
            .iter()
            .map(|intent| self.build_swap_transaction(payer, intent, priority_fee, blockhash))
            .collect()
    }
}
