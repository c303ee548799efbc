//! # PRNG Seed
//!
//! PREVRANDAO must be replayable, so the seed is derived from the record
//! file's running hash rather than any entropy source.

use crate::domain::entities::BlockContext;
use crate::domain::services::perm64;
use crate::domain::value_objects::Hash;
use crate::ports::outbound::PrngSeedSource;

/// Seeds PREVRANDAO by mixing each 8-byte lane of the block's running hash
/// with the block number.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunningHashSeed;

impl PrngSeedSource for RunningHashSeed {
    fn seed(&self, block: &BlockContext) -> Hash {
        if block.hash.is_zero() {
            return Hash::ZERO;
        }
        let mut out = [0u8; 32];
        for (lane, chunk) in out.chunks_exact_mut(8).zip(block.hash.as_bytes().chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            let mixed = perm64(u64::from_be_bytes(word) ^ block.number);
            lane.copy_from_slice(&mixed.to_be_bytes());
        }
        Hash::new(out)
    }
}
