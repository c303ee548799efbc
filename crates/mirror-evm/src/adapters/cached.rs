//! # Cached Snapshot
//!
//! Read-through cache in front of another [`SnapshotProvider`]. Account and
//! token lookups are cached; everything else passes through.

use crate::cache::{Cache, CachePolicy, TtlCache};
use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::value_objects::{Address, StorageKey, StorageValue};
use crate::errors::StateError;
use crate::ports::outbound::SnapshotProvider;
use std::sync::Arc;

/// Caching decorator.
pub struct CachedSnapshot {
    inner: Arc<dyn SnapshotProvider>,
    accounts: TtlCache<Address, Option<Account>>,
    tokens: TtlCache<Address, Option<TokenInfo>>,
}

impl CachedSnapshot {
    /// Wrap `inner`.
    ///
    /// # Arguments
    ///
    /// * `inner` - Backing snapshot
    /// * `entity` - Policy of the account cache
    /// * `token` - Policy of the token cache
    pub fn new(inner: Arc<dyn SnapshotProvider>, entity: CachePolicy, token: CachePolicy) -> Self {
        Self {
            inner,
            accounts: TtlCache::new(entity),
            tokens: TtlCache::new(token),
        }
    }

    /// Cached account entries.
    #[must_use]
    pub fn cached_accounts(&self) -> usize {
        self.accounts.len()
    }
}

impl SnapshotProvider for CachedSnapshot {
    fn account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        self.accounts
            .get_or_load(*address, || self.inner.account(address))
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
        self.inner.storage(address, key)
    }

    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
        self.tokens.get_or_load(*address, || self.inner.token(address))
    }

    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError> {
        self.inner.relationship(account, token)
    }

    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
        self.inner.nft(token, serial)
    }

    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError> {
        self.inner.allowance(owner, token, spender)
    }
}
