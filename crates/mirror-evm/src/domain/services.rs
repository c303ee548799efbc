//! # Domain Services
//!
//! Pure, deterministic helper functions. No I/O, no async.

use crate::domain::value_objects::{Address, Hash};
use sha3::{Digest, Keccak256};

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// Computes keccak256 of empty bytes (used for empty code hash).
#[must_use]
pub fn empty_code_hash() -> Hash {
    keccak256(&[])
}

// =============================================================================
// MIXING
// =============================================================================

/// 64-bit avalanche mix used to derive replayable pseudo-random values.
///
/// Additions wrap and right shifts are logical.
#[must_use]
pub fn perm64(mut x: u64) -> u64 {
    x = x.wrapping_add(x << 30);
    x ^= x >> 27;
    x = x.wrapping_add(x << 16);
    x ^= x >> 20;
    x = x.wrapping_add(x << 5);
    x ^= x >> 18;
    x = x.wrapping_add(x << 10);
    x ^= x >> 24;
    x = x.wrapping_add(x << 30);
    x
}

// =============================================================================
// RESERVED ADDRESSES
// =============================================================================

/// Reserved contract addresses.
pub mod precompiles {
    use super::Address;

    /// SHA256 (0x02)
    pub const SHA256: Address = Address::from_low_u64(2);

    /// Identity / data copy (0x04)
    pub const IDENTITY: Address = Address::from_low_u64(4);

    /// Native token service (0x167).
    pub const TOKEN_SERVICE: Address = Address::from_low_u64(0x167);

    /// Exchange rate system contract (0x168).
    pub const EXCHANGE_RATE: Address = Address::from_low_u64(0x168);

    /// Pseudo-random seed system contract (0x169).
    pub const PRNG: Address = Address::from_low_u64(0x169);

    /// Highest entity number reserved for system accounts.
    pub const SYSTEM_ACCOUNT_BOUNDARY: u64 = 750;

    /// Returns the standard precompile address for a given number (1-9).
    #[must_use]
    pub fn from_number(n: u8) -> Option<Address> {
        if (1..=9).contains(&n) {
            Some(Address::from_low_u64(u64::from(n)))
        } else {
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256() {
        // keccak256("") = c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
        let hash = keccak256(&[]);
        assert_eq!(hash.as_bytes()[0..4], [0xc5, 0xd2, 0x46, 0x01]);
        assert_eq!(empty_code_hash(), crate::domain::entities::EMPTY_CODE_HASH);
    }

    #[test]
    fn test_perm64_known_values() {
        assert_eq!(perm64(0), 0);
        // x += x << 30 on 1 gives 0x4000_0001; the chain is deterministic.
        assert_eq!(perm64(1), perm64(1));
        assert_ne!(perm64(1), perm64(2));
    }

    #[test]
    fn test_perm64_wraps_instead_of_overflowing() {
        let _ = perm64(u64::MAX);
        let _ = perm64(0x8000_0000_0000_0000);
    }

    #[test]
    fn test_reserved_addresses() {
        assert!(precompiles::SHA256.is_precompile());
        assert!(!precompiles::TOKEN_SERVICE.is_precompile());
        assert_eq!(precompiles::from_number(4), Some(precompiles::IDENTITY));
        assert_eq!(precompiles::from_number(10), None);
    }
}
