//! # Standard Precompiles
//!
//! The Ethereum precompiles this ledger keeps at their usual addresses:
//! SHA256 (0x02) and IDENTITY (0x04). Both are pure functions of their
//! input priced per 32-byte word.

pub mod identity;
pub mod sha256;

use crate::domain::value_objects::{Address, Bytes};
use crate::errors::PrecompileError;

pub use identity::Identity;
pub use sha256::Sha256Precompile;

/// Result of a standard precompile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileOutput {
    /// Gas charged.
    pub gas_used: u64,
    /// Return data.
    pub output: Bytes,
}

/// A stateless precompile.
pub trait Precompile: Send + Sync {
    /// Reserved address.
    fn address(&self) -> Address;

    /// Gas for an input.
    fn gas_cost(&self, input: &[u8]) -> u64;

    /// Output for an input.
    fn compute(&self, input: &[u8]) -> Bytes;

    /// Prices then runs the precompile.
    ///
    /// # Errors
    ///
    /// `OutOfGas` when `gas_limit` does not cover the cost.
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let gas_used = self.gas_cost(input);
        if gas_used > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }
        Ok(PrecompileOutput {
            gas_used,
            output: self.compute(input),
        })
    }
}

/// `base + word * ceil(len / 32)`.
pub(crate) fn linear_cost(base: u64, word: u64, len: usize) -> u64 {
    let words = (len as u64).div_ceil(32);
    base.saturating_add(word.saturating_mul(words))
}

/// The standard precompile at `address`, if any.
#[must_use]
pub fn standard_precompile(address: &Address) -> Option<&'static dyn Precompile> {
    if *address == crate::domain::services::precompiles::SHA256 {
        Some(&Sha256Precompile)
    } else if *address == crate::domain::services::precompiles::IDENTITY {
        Some(&Identity)
    } else {
        None
    }
}
