//! # Ports Layer (Middle Hexagon)
//!
//! Interfaces between the engine and the outside world.
//!
//! - **Driving Ports (Inbound)**: `SimulationApi`
//! - **Driven Ports (Outbound)**: `SnapshotProvider`, `UsagePricesProvider`,
//!   `HbarCentExchange`, `BlockHashOracle`, `EntityAddressSequencer`,
//!   `PrngSeedSource`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
