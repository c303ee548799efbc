//! # Frame Journal
//!
//! Pending changes of one call frame. A journal is either absorbed into its
//! parent on commit or dropped on revert; it is never partially applied.

use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::value_objects::{Address, StorageKey, StorageValue};
use std::collections::{HashMap, HashSet};

/// Fungible allowance key: owner, token, spender.
pub type AllowanceKey = (Address, Address, Address);

/// Copy-on-write change set for one frame.
///
/// `None` entries in the relationship and NFT maps are tombstones: the
/// entity existed below this frame and was removed here.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) storage: HashMap<(Address, StorageKey), StorageValue>,
    pub(crate) transient: HashMap<(Address, StorageKey), StorageValue>,
    pub(crate) tokens: HashMap<Address, TokenInfo>,
    pub(crate) relationships: HashMap<(Address, Address), Option<TokenRelationship>>,
    pub(crate) nfts: HashMap<(Address, i64), Option<Nft>>,
    pub(crate) allowances: HashMap<AllowanceKey, u64>,
    pub(crate) created: HashSet<Address>,
    pub(crate) warm_accounts: HashSet<Address>,
    pub(crate) warm_slots: HashSet<(Address, StorageKey)>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the frame changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.storage.is_empty()
            && self.transient.is_empty()
            && self.tokens.is_empty()
            && self.relationships.is_empty()
            && self.nfts.is_empty()
            && self.allowances.is_empty()
            && self.created.is_empty()
            && self.warm_accounts.is_empty()
            && self.warm_slots.is_empty()
    }

    /// Number of touched accounts.
    #[must_use]
    pub fn touched_accounts(&self) -> usize {
        self.accounts.len()
    }

    /// Layers `child` on top of this journal. Child entries win.
    pub fn absorb(&mut self, child: Journal) {
        self.accounts.extend(child.accounts);
        self.storage.extend(child.storage);
        self.transient.extend(child.transient);
        self.tokens.extend(child.tokens);
        self.relationships.extend(child.relationships);
        self.nfts.extend(child.nfts);
        self.allowances.extend(child.allowances);
        self.created.extend(child.created);
        self.warm_accounts.extend(child.warm_accounts);
        self.warm_slots.extend(child.warm_slots);
    }
}

// =============================================================================
// TESTS
// =============================================================================
