//! # World-State View
//!
//! The read-only ledger view at the simulated block, and the [`WorldView`]
//! read interface shared by the view and every stacked updater above it.

use super::updater::StackedUpdater;
use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::value_objects::{
    Address, Bytes, Hash, StorageKey, StorageValue, Timestamp, U256,
};
use crate::errors::StateError;
use crate::ports::outbound::{EntityAddressSequencer, SnapshotProvider};
use std::sync::Arc;
use tracing::error;

// =============================================================================
// READ INTERFACE
// =============================================================================

/// Reads through a frame chain: own journal, then parents, then snapshot.
pub trait WorldView {
    /// Raw account lookup. Deleted accounts are returned; token addresses
    /// are not synthesized.
    fn account_entry(&self, address: &Address) -> Result<Option<Account>, StateError>;

    /// Current storage value.
    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError>;

    /// Storage value at the start of the call, ignoring every journal.
    fn original_storage(
        &self,
        address: &Address,
        key: &StorageKey,
    ) -> Result<StorageValue, StateError>;

    /// Transient (EIP-1153) storage value.
    fn transient(&self, address: &Address, key: &StorageKey) -> StorageValue;

    /// Token metadata.
    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError>;

    /// Account-token relationship.
    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError>;

    /// One NFT.
    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError>;

    /// Fungible allowance.
    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError>;

    /// True when the address was created during the current call.
    fn is_created_in_transaction(&self, address: &Address) -> bool;

    /// True when the account was accessed earlier in the call (EIP-2929).
    fn is_warm_account(&self, address: &Address) -> bool;

    /// True when the slot was accessed earlier in the call (EIP-2929).
    fn is_warm_slot(&self, address: &Address, key: &StorageKey) -> bool;

    /// Whether token addresses read as token pseudo-accounts.
    fn redirect_token_calls(&self) -> bool;

    /// Sequencer for newly created contracts.
    fn sequencer(&self) -> &dyn EntityAddressSequencer;

    /// Account visible to the EVM.
    ///
    /// # Returns
    ///
    /// * Token pseudo-account - If the address is a token and redirect is on
    /// * `None` - If the address is absent or deleted
    /// * `Some(Account)` - Otherwise
    fn get(&self, address: &Address) -> Result<Option<Account>, StateError> {
        if self.redirect_token_calls() && self.token(address)?.is_some() {
            return Ok(Some(Account::token_account(*address)));
        }
        Ok(self.account_entry(address)?.filter(|account| !account.deleted))
    }

    /// True when `get` would return an account.
    fn exists(&self, address: &Address) -> Result<bool, StateError> {
        Ok(self.get(address)?.is_some())
    }

    /// Balance, zero for absent accounts.
    fn balance(&self, address: &Address) -> Result<U256, StateError> {
        Ok(self
            .get(address)?
            .map_or_else(U256::zero, |account| account.balance))
    }

    /// Runtime code, empty for absent accounts and tokens.
    fn code(&self, address: &Address) -> Result<Bytes, StateError> {
        Ok(self
            .get(address)?
            .map_or_else(Bytes::new, |account| account.code))
    }

    /// True when the address is treasury for at least one token.
    fn is_token_treasury(&self, address: &Address) -> Result<bool, StateError> {
        Ok(self
            .account_entry(address)?
            .is_some_and(|account| account.num_treasury_titles > 0))
    }

    /// True when the address holds a non-zero balance of any token.
    fn has_any_token_balance(&self, address: &Address) -> Result<bool, StateError> {
        Ok(self
            .account_entry(address)?
            .is_some_and(|account| account.num_positive_balances > 0))
    }

    /// True when the address owns at least one NFT.
    fn owns_nfts(&self, address: &Address) -> Result<bool, StateError> {
        Ok(self
            .account_entry(address)?
            .is_some_and(|account| account.owned_nfts > 0))
    }
}

// =============================================================================
// ROOT VIEW
// =============================================================================

/// Immutable ledger view shared by every frame of one call.
pub struct WorldStateView {
    snapshot: Arc<dyn SnapshotProvider>,
    sequencer: Arc<dyn EntityAddressSequencer>,
    redirect_token_calls: bool,
    timestamp: Timestamp,
}

impl WorldStateView {
    /// Creates a view over a snapshot.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Ledger state at the simulated block
    /// * `sequencer` - Address source for contracts created by the call
    /// * `redirect_token_calls` - Synthesize token pseudo-accounts
    /// * `timestamp` - Consensus time of the snapshot
    pub fn new(
        snapshot: Arc<dyn SnapshotProvider>,
        sequencer: Arc<dyn EntityAddressSequencer>,
        redirect_token_calls: bool,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            snapshot,
            sequencer,
            redirect_token_calls,
            timestamp,
        }
    }

    /// Consensus time of the snapshot.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Opens the top-level updater for a call.
    #[must_use]
    pub fn updater(&self) -> StackedUpdater<'_> {
        StackedUpdater::over_root(self)
    }

    /// Always the empty hash; the view is never merkleized.
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        Hash::ZERO
    }

    /// Always the empty hash.
    #[must_use]
    pub fn frontier_root_hash(&self) -> Hash {
        Hash::ZERO
    }

    /// Not meaningful on a simulation view.
    ///
    /// # Errors
    ///
    /// Always `StateError::Unsupported`.
    pub fn stream_accounts(&self, _start: Hash, _limit: usize) -> Result<Vec<Account>, StateError> {
        Err(StateError::Unsupported("stream_accounts"))
    }

    /// Storage byte-hour refund; nothing is persisted, so always zero.
    #[must_use]
    pub fn sbh_refund(&self) -> i64 {
        0
    }
}

fn logged<T>(result: Result<T, StateError>, what: &str) -> Result<T, StateError> {
    if let Err(err) = &result {
        error!(lookup = what, error = %err, "snapshot lookup failed");
    }
    result
}

impl WorldView for WorldStateView {
    fn account_entry(&self, address: &Address) -> Result<Option<Account>, StateError> {
        logged(self.snapshot.account(address), "account")
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
        logged(self.snapshot.storage(address, key), "storage")
    }

    fn original_storage(
        &self,
        address: &Address,
        key: &StorageKey,
    ) -> Result<StorageValue, StateError> {
        self.storage(address, key)
    }

    fn transient(&self, _address: &Address, _key: &StorageKey) -> StorageValue {
        StorageValue::ZERO
    }

    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
        logged(self.snapshot.token(address), "token")
    }

    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError> {
        logged(self.snapshot.relationship(account, token), "relationship")
    }

    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
        logged(self.snapshot.nft(token, serial), "nft")
    }

    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError> {
        logged(self.snapshot.allowance(owner, token, spender), "allowance")
    }

    fn is_created_in_transaction(&self, _address: &Address) -> bool {
        false
    }

    fn is_warm_account(&self, _address: &Address) -> bool {
        false
    }

    fn is_warm_slot(&self, _address: &Address, _key: &StorageKey) -> bool {
        false
    }

    fn redirect_token_calls(&self) -> bool {
        self.redirect_token_calls
    }

    fn sequencer(&self) -> &dyn EntityAddressSequencer {
        self.sequencer.as_ref()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySnapshot;
    use crate::state::sequencer::SimulatedSequencer;

    fn view(snapshot: InMemorySnapshot, redirect: bool) -> WorldStateView {
        WorldStateView::new(
            Arc::new(snapshot),
            Arc::new(SimulatedSequencer::new(5000)),
            redirect,
            Timestamp::from_seconds(1_000),
        )
    }

    #[test]
    fn test_get_absent_account() {
        let view = view(InMemorySnapshot::new(), true);
        assert_eq!(view.get(&Address::from_low_u64(1001)).unwrap(), None);
    }

    #[test]
    fn test_get_token_redirect() {
        let token = Address::from_low_u64(1500);
        let snapshot = InMemorySnapshot::new().with_token(TokenInfo {
            address: token,
            ..TokenInfo::default()
        });

        let redirected = view(snapshot.clone(), true).get(&token).unwrap().unwrap();
        assert!(redirected.is_token());
        assert!(redirected.code.is_empty());

        assert_eq!(view(snapshot, false).get(&token).unwrap(), None);
    }

    #[test]
    fn test_get_deleted_account_is_absent() {
        let addr = Address::from_low_u64(1002);
        let mut account = Account::new_eoa(addr, U256::from(10));
        account.deleted = true;
        let view = view(InMemorySnapshot::new().with_account(account), true);

        assert_eq!(view.get(&addr).unwrap(), None);
        assert!(view.account_entry(&addr).unwrap().is_some());
    }

    #[test]
    fn test_unsupported_root_operations() {
        let view = view(InMemorySnapshot::new(), true);
        assert_eq!(view.root_hash(), Hash::ZERO);
        assert_eq!(view.frontier_root_hash(), Hash::ZERO);
        assert_eq!(view.sbh_refund(), 0);
        assert_eq!(
            view.stream_accounts(Hash::ZERO, 10),
            Err(StateError::Unsupported("stream_accounts"))
        );
    }

    #[test]
    fn test_self_destruct_queries_are_counter_lookups() {
        let addr = Address::from_low_u64(1003);
        let mut account = Account::new_contract(addr, Bytes::from(vec![0x00]));
        account.num_treasury_titles = 1;
        account.owned_nfts = 2;
        let view = view(InMemorySnapshot::new().with_account(account), true);

        assert!(view.is_token_treasury(&addr).unwrap());
        assert!(!view.has_any_token_balance(&addr).unwrap());
        assert!(view.owns_nfts(&addr).unwrap());
    }
}
