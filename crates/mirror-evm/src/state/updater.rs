//! # Stacked Updater
//!
//! One updater per call frame. Writes land in the frame's own journal;
//! reads fall back through the parent chain to the root view. A child
//! borrows its parent mutably, so the parent cannot be touched until the
//! child has been committed or reverted.

use super::journal::Journal;
use super::world_state::{WorldStateView, WorldView};
use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::value_objects::{Address, StorageKey, StorageValue};
use crate::errors::StateError;
use crate::ports::outbound::EntityAddressSequencer;
use tracing::debug;

/// Upper bound on sequencer draws when looking for a free address.
const MAX_ADDRESS_ATTEMPTS: usize = 1_000;

/// A [`WorldView`] that can take ownership of a child's journal.
pub trait Journaled: WorldView {
    /// Layers a committed child journal on top of this frame.
    fn absorb(&mut self, journal: Journal);

    /// This frame as a plain read view.
    fn as_view(&self) -> &dyn WorldView;
}

enum Parent<'a> {
    Root(&'a WorldStateView),
    Frame(&'a mut (dyn Journaled + 'a)),
}

/// Copy-on-write frame over a parent frame or the root view.
pub struct StackedUpdater<'a> {
    parent: Parent<'a>,
    journal: Journal,
    depth: usize,
}

impl<'a> StackedUpdater<'a> {
    pub(crate) fn over_root(root: &'a WorldStateView) -> Self {
        Self {
            parent: Parent::Root(root),
            journal: Journal::new(),
            depth: 0,
        }
    }

    /// Opens a child frame.
    pub fn updater(&mut self) -> StackedUpdater<'_> {
        let depth = self.depth + 1;
        StackedUpdater {
            parent: Parent::Frame(self),
            journal: Journal::new(),
            depth,
        }
    }

    /// Nesting depth; zero for the top-level updater.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pending changes of this frame only.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn parent(&self) -> &dyn WorldView {
        match &self.parent {
            Parent::Root(root) => *root as &dyn WorldView,
            Parent::Frame(frame) => frame.as_view(),
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Proposes this frame's changes to the parent. At the top level this
    /// discards them; nothing is ever persisted.
    pub fn commit(self) {
        debug!(
            depth = self.depth,
            touched = self.journal.touched_accounts(),
            "frame committed"
        );
        match self.parent {
            Parent::Root(_) => {}
            Parent::Frame(parent) => parent.absorb(self.journal),
        }
    }

    /// Discards this frame's changes.
    pub fn revert(self) {
        debug!(
            depth = self.depth,
            touched = self.journal.touched_accounts(),
            "frame reverted"
        );
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    /// Copies an account into this frame's journal and returns it for
    /// mutation. Absent, deleted and token accounts yield `None`.
    ///
    /// # Errors
    ///
    /// Snapshot failures.
    pub fn get_for_mutation(&mut self, address: &Address) -> Result<Option<&mut Account>, StateError> {
        if !self.journal.accounts.contains_key(address) {
            match self.get(address)? {
                Some(account) if !account.is_token() => {
                    self.journal.accounts.insert(*address, account);
                }
                _ => return Ok(None),
            }
        }
        Ok(self
            .journal
            .accounts
            .get_mut(address)
            .filter(|account| !account.deleted))
    }

    /// Writes an account into this frame, marking it as created here.
    pub fn create_account(&mut self, account: Account) {
        let address = account.address;
        self.journal.created.insert(address);
        self.journal.warm_accounts.insert(address);
        self.journal.accounts.insert(address, account);
    }

    /// Marks an account deleted. Later reads treat it as absent.
    ///
    /// # Errors
    ///
    /// `StateError::MissingEntity` when the account is not visible.
    pub fn delete_account(&mut self, address: &Address) -> Result<(), StateError> {
        let account = self
            .get_for_mutation(address)?
            .ok_or_else(|| StateError::MissingEntity(address.to_string()))?;
        account.deleted = true;
        Ok(())
    }

    /// Allocates an address for a new contract. The sequencer is drawn
    /// until it yields an address with no account and no token behind it.
    ///
    /// # Errors
    ///
    /// Snapshot failures, or the sequencer never yielding a free address.
    pub fn new_contract_address(&self, sponsor: &Address) -> Result<Address, StateError> {
        for _ in 0..MAX_ADDRESS_ATTEMPTS {
            let candidate = self.sequencer().next_contract_address(sponsor);
            if self.account_entry(&candidate)?.is_none() && self.token(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(StateError::Snapshot(format!(
            "no free contract address after {MAX_ADDRESS_ATTEMPTS} attempts"
        )))
    }

    // =========================================================================
    // STORAGE
    // =========================================================================

    /// Writes a storage slot.
    pub fn set_storage(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.journal.storage.insert((address, key), value);
    }

    /// Writes a transient slot.
    pub fn set_transient(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.journal.transient.insert((address, key), value);
    }

    /// Marks an account warm. Returns whether it already was.
    pub fn warm_account(&mut self, address: Address) -> bool {
        let was_warm = self.is_warm_account(&address);
        self.journal.warm_accounts.insert(address);
        was_warm
    }

    /// Marks a slot warm. Returns whether it already was.
    pub fn warm_slot(&mut self, address: Address, key: StorageKey) -> bool {
        let was_warm = self.is_warm_slot(&address, &key);
        self.journal.warm_slots.insert((address, key));
        was_warm
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// Writes token metadata.
    pub fn put_token(&mut self, token: TokenInfo) {
        self.journal.tokens.insert(token.address, token);
    }

    /// Writes or removes (`None`) a relationship.
    pub fn put_relationship(
        &mut self,
        account: Address,
        token: Address,
        relationship: Option<TokenRelationship>,
    ) {
        self.journal
            .relationships
            .insert((account, token), relationship);
    }

    /// Writes or burns (`None`) an NFT.
    pub fn put_nft(&mut self, token: Address, serial: i64, nft: Option<Nft>) {
        self.journal.nfts.insert((token, serial), nft);
    }

    /// Sets a fungible allowance.
    pub fn set_allowance(&mut self, owner: Address, token: Address, spender: Address, amount: u64) {
        self.journal
            .allowances
            .insert((owner, token, spender), amount);
    }
}

impl WorldView for StackedUpdater<'_> {
    fn account_entry(&self, address: &Address) -> Result<Option<Account>, StateError> {
        match self.journal.accounts.get(address) {
            Some(account) => Ok(Some(account.clone())),
            None => self.parent().account_entry(address),
        }
    }

    fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
        match self.journal.storage.get(&(*address, *key)) {
            Some(value) => Ok(*value),
            None => self.parent().storage(address, key),
        }
    }

    fn original_storage(
        &self,
        address: &Address,
        key: &StorageKey,
    ) -> Result<StorageValue, StateError> {
        self.parent().original_storage(address, key)
    }

    fn transient(&self, address: &Address, key: &StorageKey) -> StorageValue {
        match self.journal.transient.get(&(*address, *key)) {
            Some(value) => *value,
            None => self.parent().transient(address, key),
        }
    }

    fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
        match self.journal.tokens.get(address) {
            Some(token) => Ok(Some(token.clone())),
            None => self.parent().token(address),
        }
    }

    fn relationship(
        &self,
        account: &Address,
        token: &Address,
    ) -> Result<Option<TokenRelationship>, StateError> {
        match self.journal.relationships.get(&(*account, *token)) {
            Some(entry) => Ok(entry.clone()),
            None => self.parent().relationship(account, token),
        }
    }

    fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
        match self.journal.nfts.get(&(*token, serial)) {
            Some(entry) => Ok(entry.clone()),
            None => self.parent().nft(token, serial),
        }
    }

    fn allowance(
        &self,
        owner: &Address,
        token: &Address,
        spender: &Address,
    ) -> Result<u64, StateError> {
        match self.journal.allowances.get(&(*owner, *token, *spender)) {
            Some(amount) => Ok(*amount),
            None => self.parent().allowance(owner, token, spender),
        }
    }

    fn is_created_in_transaction(&self, address: &Address) -> bool {
        self.journal.created.contains(address) || self.parent().is_created_in_transaction(address)
    }

    fn is_warm_account(&self, address: &Address) -> bool {
        self.journal.warm_accounts.contains(address) || self.parent().is_warm_account(address)
    }

    fn is_warm_slot(&self, address: &Address, key: &StorageKey) -> bool {
        self.journal.warm_slots.contains(&(*address, *key)) || self.parent().is_warm_slot(address, key)
    }

    fn redirect_token_calls(&self) -> bool {
        self.parent().redirect_token_calls()
    }

    fn sequencer(&self) -> &dyn EntityAddressSequencer {
        self.parent().sequencer()
    }
}

impl Journaled for StackedUpdater<'_> {
    fn absorb(&mut self, journal: Journal) {
        self.journal.absorb(journal);
    }

    fn as_view(&self) -> &dyn WorldView {
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
