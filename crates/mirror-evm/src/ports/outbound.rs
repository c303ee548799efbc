//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the simulator depends on. Adapters implement these to
//! provide:
//! - The historical ledger snapshot (accounts, storage, tokens)
//! - Fee schedules and exchange rates
//! - Block hashes, entity numbering and the PRNG seed
//!
//! All ports are synchronous. Execution runs on a blocking worker, so an
//! adapter backed by a database may block.

use crate::domain::entities::{Account, BlockContext, Nft, TokenInfo, TokenRelationship};
use crate::domain::transactions::Functionality;
use crate::domain::value_objects::{Address, Hash, StorageKey, StorageValue, Timestamp};
use crate::errors::{PricingError, StateError};
use crate::pricing::{ExchangeRate, FeeData, SubType};
use std::collections::HashMap;

// =============================================================================
// SNAPSHOT PROVIDER
// =============================================================================

/// Read-only ledger state as of the simulated block.
///
/// Every method is a point lookup. Absent entities are `Ok(None)`; `Err` is
/// reserved for the backing store failing.
pub trait SnapshotProvider: Send + Sync {
    /// Get an account, contract or token pseudo-account.
    ///
    /// # Returns
    ///
    /// * `Some(Account)` - If the address maps to an entity (deleted ones included)
    /// * `None` - If nothing was ever created at the address
    fn account(&self, address: &Address) -> Result<Option<Account>, StateError>;

    /// Get a storage slot. Unwritten slots read as zero.
    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError>;

    /// Get token metadata.
    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError>;

    /// Get the relationship between an account and a token.
    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError>;

    /// Get one NFT.
    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError>;

    /// Get a fungible allowance. Missing allowances read as zero.
    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError>;

    /// True when the address is a token.
    fn is_token(&self, address: &Address) -> Result<bool, StateError> {
        Ok(self.token(address)?.is_some())
    }
}

// =============================================================================
// FEE SCHEDULES
// =============================================================================

/// Fee schedule lookup.
pub trait UsagePricesProvider: Send + Sync {
    /// All sub-type prices for a function at a consensus time.
    ///
    /// # Errors
    ///
    /// `PricingError::MissingFeeSchedule` when no schedule covers `at`.
    fn prices_given(
        &self,
        function: Functionality,
        at: Timestamp,
    ) -> Result<HashMap<SubType, FeeData>, PricingError>;

    /// The default sub-type prices for a function.
    ///
    /// # Errors
    ///
    /// `PricingError::MissingFeeSchedule` when no schedule covers `at` or
    /// it has no default entry.
    fn default_prices_given(
        &self,
        function: Functionality,
        at: Timestamp,
    ) -> Result<FeeData, PricingError> {
        self.prices_given(function, at)?
            .remove(&SubType::Default)
            .ok_or_else(|| PricingError::MissingFeeSchedule {
                function: function.to_string(),
                seconds: at.seconds(),
            })
    }
}

/// Hbar/cent exchange rate lookup.
pub trait HbarCentExchange: Send + Sync {
    /// Rate active at a consensus time.
    ///
    /// # Errors
    ///
    /// `PricingError::MissingExchangeRate` when no rate covers `at`.
    fn rate(&self, at: Timestamp) -> Result<ExchangeRate, PricingError>;
}

// =============================================================================
// BLOCK HASH ORACLE (For BLOCKHASH opcode)
// =============================================================================

/// Interface for querying historical block hashes.
///
/// Used by the BLOCKHASH opcode which can access the last 256 block hashes.
pub trait BlockHashOracle: Send + Sync {
    /// Get block hash for a given block number.
    ///
    /// # Returns
    ///
    /// * `Some(Hash)` - Block hash if within valid range (last 256 blocks)
    /// * `None` - If block is too old or doesn't exist
    fn block_hash(&self, number: u64, current_number: u64) -> Option<Hash>;
}

// =============================================================================
// ENTITY NUMBERING
// =============================================================================

/// Hands out addresses for contracts created during simulation.
pub trait EntityAddressSequencer: Send + Sync {
    /// Next contract address in the sponsor's shard and realm.
    fn next_contract_address(&self, sponsor: &Address) -> Address;
}

// =============================================================================
// PRNG SEED
// =============================================================================

/// Source of the value PREVRANDAO returns.
pub trait PrngSeedSource: Send + Sync {
    /// 32-byte seed for a block. Must be replayable.
    fn seed(&self, block: &BlockContext) -> Hash;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptySnapshot;

    impl SnapshotProvider for EmptySnapshot {
        fn account(&self, _address: &Address) -> Result<Option<Account>, StateError> {
            Ok(None)
        }

        fn storage(&self, _: &Address, _: &StorageKey) -> Result<StorageValue, StateError> {
            Ok(StorageValue::ZERO)
        }

        fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
            if *address == Address::from_low_u64(1001) {
                Ok(Some(TokenInfo {
                    address: *address,
                    ..TokenInfo::default()
                }))
            } else {
                Ok(None)
            }
        }

        fn relationship(
            &self,
            _: &Address,
            _: &Address,
        ) -> Result<Option<TokenRelationship>, StateError> {
            Ok(None)
        }

        fn nft(&self, _: &Address, _: i64) -> Result<Option<Nft>, StateError> {
            Ok(None)
        }

        fn allowance(&self, _: &Address, _: &Address, _: &Address) -> Result<u64, StateError> {
            Ok(0)
        }
    }

    struct OneSchedule;

    impl UsagePricesProvider for OneSchedule {
        fn prices_given(
            &self,
            function: Functionality,
            at: Timestamp,
        ) -> Result<HashMap<SubType, FeeData>, PricingError> {
            if function == Functionality::ContractCall {
                Ok(HashMap::from([(SubType::Default, FeeData::default())]))
            } else {
                Err(PricingError::MissingFeeSchedule {
                    function: function.to_string(),
                    seconds: at.seconds(),
                })
            }
        }
    }

    #[test]
    fn test_is_token_default_method() {
        let snapshot = EmptySnapshot;
        assert!(snapshot.is_token(&Address::from_low_u64(1001)).unwrap());
        assert!(!snapshot.is_token(&Address::from_low_u64(1002)).unwrap());
    }

    #[test]
    fn test_default_prices_given() {
        let provider = OneSchedule;
        let at = Timestamp::from_seconds(10);
        assert!(provider
            .default_prices_given(Functionality::ContractCall, at)
            .is_ok());
        assert!(matches!(
            provider.default_prices_given(Functionality::TokenMint, at),
            Err(PricingError::MissingFeeSchedule { seconds: 10, .. })
        ));
    }
}
