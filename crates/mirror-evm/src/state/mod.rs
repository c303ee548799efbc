//! # State
//!
//! Read-only world-state view over a ledger snapshot, with stacked
//! copy-on-write updaters for nested call frames.
//!
//! ```text
//! StackedUpdater (depth n)
//!        │ commit / revert
//!        ▼
//! StackedUpdater (depth 1)
//!        │
//!        ▼
//! WorldStateView ──► SnapshotProvider
//! ```

pub mod journal;
pub mod sequencer;
pub mod updater;
pub mod world_state;

pub use journal::{AllowanceKey, Journal};
pub use sequencer::SimulatedSequencer;
pub use updater::{Journaled, StackedUpdater};
pub use world_state::{WorldStateView, WorldView};
