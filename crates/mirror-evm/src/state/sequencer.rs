//! # Simulated Entity Sequencer
//!
//! Contracts created during a simulation get entity numbers from a local
//! counter instead of a durable ledger sequence. The numbers never leave
//! the process.

use crate::domain::value_objects::{Address, EntityId};
use crate::ports::outbound::EntityAddressSequencer;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter-backed [`EntityAddressSequencer`].
#[derive(Debug)]
pub struct SimulatedSequencer {
    next: AtomicU64,
}

impl SimulatedSequencer {
    /// Starts numbering at `first_num`.
    #[must_use]
    pub fn new(first_num: u64) -> Self {
        Self {
            next: AtomicU64::new(first_num),
        }
    }

    /// Number the next draw will return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl EntityAddressSequencer for SimulatedSequencer {
    fn next_contract_address(&self, sponsor: &Address) -> Address {
        let num = self.next.fetch_add(1, Ordering::Relaxed);
        // Aliased sponsors have no shard/realm; they live in 0.0.
        let (shard, realm) = EntityId::from_address(sponsor)
            .map_or((0, 0), |id| (id.shard, id.realm));
        EntityId::new(shard, realm, num).to_address()
    }
}
