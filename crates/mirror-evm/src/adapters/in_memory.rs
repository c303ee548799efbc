//! # In-Memory Snapshot
//!
//! Ledger snapshot held in plain maps. Used by tests, benchmarks and
//! anything that materializes a snapshot up front.

use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::value_objects::{Address, StorageKey, StorageValue};
use crate::errors::StateError;
use crate::ports::outbound::SnapshotProvider;
use std::collections::HashMap;

/// Immutable snapshot built with `with_*` calls.
#[derive(Clone, Debug, Default)]
pub struct InMemorySnapshot {
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, StorageKey), StorageValue>,
    tokens: HashMap<Address, TokenInfo>,
    relationships: HashMap<(Address, Address), TokenRelationship>,
    nfts: HashMap<(Address, i64), Nft>,
    allowances: HashMap<(Address, Address, Address), u64>,
}

impl InMemorySnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account.
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.insert(account.address, account);
        self
    }

    /// Set a storage slot.
    #[must_use]
    pub fn with_storage(mut self, address: Address, key: StorageKey, value: StorageValue) -> Self {
        self.storage.insert((address, key), value);
        self
    }

    /// Add or replace a token.
    #[must_use]
    pub fn with_token(mut self, token: TokenInfo) -> Self {
        self.tokens.insert(token.address, token);
        self
    }

    /// Add or replace a relationship.
    #[must_use]
    pub fn with_relationship(mut self, relationship: TokenRelationship) -> Self {
        self.relationships
            .insert((relationship.account, relationship.token), relationship);
        self
    }

    /// Add or replace an NFT.
    #[must_use]
    pub fn with_nft(mut self, nft: Nft) -> Self {
        self.nfts.insert((nft.token, nft.serial), nft);
        self
    }

    /// Set a fungible allowance.
    #[must_use]
    pub fn with_allowance(
        mut self,
        owner: Address,
        token: Address,
        spender: Address,
        amount: u64,
    ) -> Self {
        self.allowances.insert((owner, token, spender), amount);
        self
    }

    /// Number of accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl SnapshotProvider for InMemorySnapshot {
    fn account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        Ok(self.accounts.get(address).cloned())
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
        Ok(self
            .storage
            .get(&(*address, *key))
            .copied()
            .unwrap_or(StorageValue::ZERO))
    }

    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
        Ok(self.tokens.get(address).cloned())
    }

    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError> {
        Ok(self.relationships.get(&(*account, *token)).cloned())
    }

    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
        Ok(self.nfts.get(&(*token, serial)).cloned())
    }

    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError> {
        Ok(self
            .allowances
            .get(&(*owner, *token, *spender))
            .copied()
            .unwrap_or(0))
    }
}

// =============================================================================
// TESTS
// =============================================================================
