//! IDENTITY (0x04).

use super::{linear_cost, Precompile};
use crate::domain::services::precompiles::IDENTITY;
use crate::domain::value_objects::{Address, Bytes};

const IDENTITY_BASE_COST: u64 = 15;
const IDENTITY_WORD_COST: u64 = 3;

/// Echoes its input.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Precompile for Identity {
    fn address(&self) -> Address {
        IDENTITY
    }

    fn gas_cost(&self, input: &[u8]) -> u64 {
        linear_cost(IDENTITY_BASE_COST, IDENTITY_WORD_COST, input.len())
    }

    fn compute(&self, input: &[u8]) -> Bytes {
        Bytes::from_slice(input)
    }
}
