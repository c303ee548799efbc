//! # Gas Schedule
//!
//! Static opcode costs, the EIP-2929/3529 dynamic rules and the ledger's
//! gas calculator overrides.
//!
//! ## Ledger Overrides
//!
//! The ledger prices three things differently from mainnet:
//!
//! - Intrinsic gas is zero (the transaction fee already covers it)
//! - Code deposit is 200 gas per byte
//! - LOG is the larger of the standard cost and the cost of keeping the
//!   log in RAM for three minutes at the current `rbh` price

use super::opcodes::Opcode;
use crate::domain::transactions::Functionality;
use crate::domain::value_objects::{Timestamp, U256};
use crate::errors::PricingError;
use crate::pricing::{PricesSource, ResourceKind};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// BASE GAS COSTS
// =============================================================================

/// Gas constants.
pub mod costs {
    /// Zero tier.
    pub const ZERO: u64 = 0;
    /// Base tier.
    pub const BASE: u64 = 2;
    /// Very-low tier.
    pub const VERY_LOW: u64 = 3;
    /// Low tier.
    pub const LOW: u64 = 5;
    /// Mid tier.
    pub const MID: u64 = 8;
    /// High tier.
    pub const HIGH: u64 = 10;
    /// JUMPDEST.
    pub const JUMPDEST: u64 = 1;
    /// BLOCKHASH.
    pub const BLOCKHASH: u64 = 20;

    /// Per word copied.
    pub const COPY: u64 = 3;
    /// KECCAK256 base.
    pub const KECCAK256: u64 = 30;
    /// KECCAK256 per word.
    pub const KECCAK256_WORD: u64 = 6;
    /// EXP base.
    pub const EXP: u64 = 10;
    /// EXP per exponent byte.
    pub const EXP_BYTE: u64 = 50;

    /// First touch of a slot in a transaction.
    pub const COLD_SLOAD: u64 = 2100;
    /// Slot already touched.
    pub const WARM_STORAGE_READ: u64 = 100;
    /// First touch of an account in a transaction.
    pub const COLD_ACCOUNT_ACCESS: u64 = 2600;
    /// TLOAD and TSTORE.
    pub const TRANSIENT: u64 = 100;

    /// SSTORE zero to non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// SSTORE of a clean non-zero slot, cold surcharge excluded.
    pub const SSTORE_RESET: u64 = 2900;
    /// Refund for clearing a slot.
    pub const SSTORE_CLEARS_REFUND: i64 = 4800;
    /// SSTORE fails when no more than this much gas is left.
    pub const SSTORE_SENTRY: u64 = 2300;

    /// Value-bearing CALL surcharge.
    pub const CALL_VALUE: u64 = 9000;
    /// CALL sending value to an empty account.
    pub const NEW_ACCOUNT: u64 = 25_000;
    /// Gas handed to a callee receiving value.
    pub const CALL_STIPEND: u64 = 2300;

    /// CREATE and CREATE2 base.
    pub const CREATE: u64 = 32_000;
    /// Per word of init code, from Shanghai.
    pub const INIT_CODE_WORD: u64 = 2;

    /// LOG base.
    pub const LOG: u64 = 375;
    /// Per topic.
    pub const LOG_TOPIC: u64 = 375;
    /// Per data byte.
    pub const LOG_DATA: u64 = 8;

    /// SELFDESTRUCT base.
    pub const SELFDESTRUCT: u64 = 5000;

    /// Ledger code deposit, per byte.
    pub const CODE_DEPOSIT_BYTE: u64 = 200;
}

/// Maximum refund as a fraction of gas used (EIP-3529).
pub const MAX_REFUND_QUOTIENT: u64 = 5;

/// Cost charged before an opcode runs. Dynamic parts (memory, access lists,
/// value transfer, logs) are added by the interpreter.
#[must_use]
pub const fn static_cost(op: Opcode) -> u64 {
    use costs::{BASE, BLOCKHASH, CREATE, EXP, HIGH, JUMPDEST, KECCAK256, LOW, MID, TRANSIENT,
        VERY_LOW, ZERO};
    match op.0 {
        0x01 | 0x03 | 0x10..=0x1D | 0x35 | 0x37 | 0x39 | 0x3E | 0x49 | 0x51..=0x53 | 0x5E => {
            VERY_LOW
        }
        0x02 | 0x04..=0x07 | 0x0B | 0x47 => LOW,
        0x08 | 0x09 | 0x56 => MID,
        0x0A => EXP,
        0x57 => HIGH,
        0x20 => KECCAK256,
        0x30 | 0x32..=0x34 | 0x36 | 0x38 | 0x3A | 0x3D | 0x41..=0x46 | 0x48 | 0x4A | 0x50
        | 0x58..=0x5A | 0x5F => BASE,
        0x40 => BLOCKHASH,
        0x5B => JUMPDEST,
        0x5C | 0x5D => TRANSIENT,
        0x60..=0x9F => VERY_LOW,
        0xF0 | 0xF5 => CREATE,
        _ => ZERO,
    }
}

// =============================================================================
// DYNAMIC COSTS
// =============================================================================

fn words(size: usize) -> u64 {
    (size as u64).div_ceil(32)
}

/// EXP cost for an exponent.
#[must_use]
pub fn exp_gas_cost(exponent: U256) -> u64 {
    let bytes = exponent.bits().div_ceil(8) as u64;
    costs::EXP + costs::EXP_BYTE * bytes
}

/// Per-word part of KECCAK256 and CREATE2 hashing.
#[must_use]
pub fn keccak256_word_cost(size: usize) -> u64 {
    costs::KECCAK256_WORD.saturating_mul(words(size))
}

/// Per-word part of the *COPY opcodes.
#[must_use]
pub fn copy_gas_cost(size: usize) -> u64 {
    costs::COPY.saturating_mul(words(size))
}

/// Init code surcharge of CREATE and CREATE2 (EIP-3860).
#[must_use]
pub fn init_code_cost(size: usize) -> u64 {
    costs::INIT_CODE_WORD.saturating_mul(words(size))
}

/// Account access surcharge (EIP-2929). Warm accesses are covered by the
/// static cost of the opcode where one exists.
#[must_use]
pub const fn account_access_cost(was_warm: bool) -> u64 {
    if was_warm {
        costs::WARM_STORAGE_READ
    } else {
        costs::COLD_ACCOUNT_ACCESS
    }
}

/// SLOAD cost.
#[must_use]
pub const fn sload_cost(was_warm: bool) -> u64 {
    if was_warm {
        costs::WARM_STORAGE_READ
    } else {
        costs::COLD_SLOAD
    }
}

/// SSTORE cost and refund delta under EIP-2200, 2929 and 3529.
///
/// # Arguments
///
/// * `original` - Slot value at the start of the transaction
/// * `current` - Slot value now
/// * `new` - Value being written
/// * `was_warm` - Whether the slot was already accessed
#[must_use]
pub fn sstore_cost(original: U256, current: U256, new: U256, was_warm: bool) -> (u64, i64) {
    let cold = if was_warm { 0 } else { costs::COLD_SLOAD };
    let warm = costs::WARM_STORAGE_READ;

    if current == new {
        return (cold + warm, 0);
    }
    if original == current {
        if original.is_zero() {
            return (cold + costs::SSTORE_SET, 0);
        }
        let refund = if new.is_zero() { costs::SSTORE_CLEARS_REFUND } else { 0 };
        return (cold + costs::SSTORE_RESET, refund);
    }

    let mut refund = 0i64;
    if !original.is_zero() {
        if current.is_zero() {
            refund -= costs::SSTORE_CLEARS_REFUND;
        } else if new.is_zero() {
            refund += costs::SSTORE_CLEARS_REFUND;
        }
    }
    if original == new {
        let restored = if original.is_zero() {
            costs::SSTORE_SET
        } else {
            costs::SSTORE_RESET
        };
        refund += (restored - warm) as i64;
    }
    (cold + warm, refund)
}

/// Gas forwarded to a child frame: the request capped at all but one
/// 64th of what is left (EIP-150).
#[must_use]
pub fn call_gas_forwarded(available: u64, requested: U256) -> u64 {
    let cap = available - available / 64;
    if requested > U256::from(cap) {
        cap
    } else {
        requested.as_u64()
    }
}

/// Refund actually granted at the end of a transaction.
#[must_use]
pub fn capped_refund(gas_used: u64, refund_counter: i64) -> u64 {
    let counter = u64::try_from(refund_counter).unwrap_or(0);
    counter.min(gas_used / MAX_REFUND_QUOTIENT)
}

/// Standard LOG cost without memory expansion.
#[must_use]
pub fn standard_log_cost(data_len: usize, topics: usize) -> u64 {
    costs::LOG
        .saturating_add(costs::LOG_TOPIC.saturating_mul(topics as u64))
        .saturating_add(costs::LOG_DATA.saturating_mul(data_len as u64))
}

// =============================================================================
// LEDGER GAS CALCULATOR
// =============================================================================

/// Seconds a log is priced as held in RAM.
pub const LOG_STORAGE_SECONDS: u64 = 180;

/// Fixed overhead of a stored log record, in bytes.
pub const LOG_RECORD_OVERHEAD: u64 = 24;

/// Bloom filter bytes per log.
pub const LOG_BLOOM_BYTES: u64 = 256;

/// Inputs the ledger overrides need from the executing call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasContext {
    /// Consensus time of the simulated block.
    pub now: Timestamp,
    /// Function the fee schedule is keyed by.
    pub function: Functionality,
    /// Gas price of the call in tinybars.
    pub gas_price: u64,
}

impl GasContext {
    /// Context of a contract call.
    #[must_use]
    pub fn contract_call(now: Timestamp, gas_price: U256) -> Self {
        Self {
            now,
            function: Functionality::ContractCall,
            gas_price: if gas_price > U256::from(u64::MAX) {
                u64::MAX
            } else {
                gas_price.as_u64()
            },
        }
    }
}

/// Ledger gas calculator.
#[derive(Clone)]
pub struct LedgerGasCalculator {
    prices: Arc<PricesSource>,
}

impl LedgerGasCalculator {
    /// Creates a calculator over a price source.
    pub fn new(prices: Arc<PricesSource>) -> Self {
        Self { prices }
    }

    /// Price source used for the storage component of LOG.
    #[must_use]
    pub fn prices(&self) -> &Arc<PricesSource> {
        &self.prices
    }

    /// Intrinsic gas. Always zero on this ledger.
    #[must_use]
    pub const fn transaction_intrinsic_gas_cost(&self, _payload: &[u8], _is_create: bool) -> u64 {
        0
    }

    /// Gas to store `code_len` bytes of deployed code.
    #[must_use]
    pub const fn code_deposit_gas_cost(&self, code_len: usize) -> u64 {
        costs::CODE_DEPOSIT_BYTE.saturating_mul(code_len as u64)
    }

    /// LOG cost excluding memory expansion.
    ///
    /// # Errors
    ///
    /// No `rbh` price or exchange rate at `ctx.now`.
    pub fn log_operation_gas_cost(
        &self,
        ctx: &GasContext,
        data_len: usize,
        topics: usize,
    ) -> Result<u64, PricingError> {
        let standard = standard_log_cost(data_len, topics);
        let storage = self.log_storage_gas_cost(ctx, data_len, topics)?;
        trace!(data_len, topics, standard, storage, "log gas");
        Ok(standard.max(storage))
    }

    fn log_storage_gas_cost(
        &self,
        ctx: &GasContext,
        data_len: usize,
        topics: usize,
    ) -> Result<u64, PricingError> {
        let rbh_tinybars = self
            .prices
            .current_price(ctx.now, ctx.function, ResourceKind::Rbh)?;
        let size = LOG_RECORD_OVERHEAD + LOG_BLOOM_BYTES + 32 * topics as u64 + data_len as u64;

        let tinybars = u128::from(LOG_STORAGE_SECONDS)
            * u128::try_from(rbh_tinybars).unwrap_or(0)
            * u128::from(size)
            / 3600;
        let gas = tinybars / u128::from(ctx.gas_price.max(1));
        Ok(u64::try_from(gas).unwrap_or(u64::MAX))
    }

    /// SELFDESTRUCT cost. The beneficiary access surcharge is added by the
    /// interpreter.
    #[must_use]
    pub fn self_destruct_operation_gas_cost(&self, beneficiary_empty: bool, value: U256) -> u64 {
        if beneficiary_empty && !value.is_zero() {
            costs::SELFDESTRUCT + costs::NEW_ACCOUNT
        } else {
            costs::SELFDESTRUCT
        }
    }
}

impl std::fmt::Debug for LedgerGasCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGasCalculator").finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
