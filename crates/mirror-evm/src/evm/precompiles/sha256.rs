//! SHA256 (0x02).

use super::{linear_cost, Precompile};
use crate::domain::services::precompiles::SHA256;
use crate::domain::value_objects::{Address, Bytes};
use sha2::{Digest, Sha256};

const SHA256_BASE_COST: u64 = 60;
const SHA256_WORD_COST: u64 = 12;

/// SHA-256 digest of the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Precompile;

impl Precompile for Sha256Precompile {
    fn address(&self) -> Address {
        SHA256
    }

    fn gas_cost(&self, input: &[u8]) -> u64 {
        linear_cost(SHA256_BASE_COST, SHA256_WORD_COST, input.len())
    }

    fn compute(&self, input: &[u8]) -> Bytes {
        Bytes::from_slice(&Sha256::digest(input))
    }
}
