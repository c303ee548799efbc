//! # Mirror EVM - Historical Contract Call Simulation
//!
//! Re-executes contract calls against the ledger state of a past block.
//! The engine picks the EVM version that was live at the block timestamp,
//! layers per-frame updaters over a read-only snapshot, routes calls to
//! the native token service through a precompile dispatcher, and prices
//! them with the fee schedule in force at that time.
//!
//! ## Guarantees
//!
//! | Property | Enforcement Location |
//! |----------|---------------------|
//! | Version chosen by timestamp, hint wins when registered | `evm/versions.rs` - `VersionRegistry::resolve()` |
//! | Reverted frames leave no trace | `state/updater.rs` - `StackedUpdater::revert()` |
//! | Nothing is ever persisted | `service.rs` - fresh `WorldStateView` per call |
//! | Static frames cannot write | `evm/interpreter.rs`, `precompile/mod.rs` |
//! | SELFDESTRUCT halt order | `evm/operations.rs` - `self_destruct_halt()` |
//! | Deadline aborts the whole call | `service.rs` - cancel flag, `VmError::Timeout` |
//!
//! ## Execution Limits
//!
//! | Limit | Default | Purpose |
//! |-------|---------|---------|
//! | `max_gas_limit` | 15,000,000 | Per-call gas cap |
//! | `max_call_depth` | 1024 | Frame depth |
//! | `max_code_size` | 24 KB (EIP-170) | Deployed code size |
//! | `max_init_code_size` | 48 KB (EIP-3860) | Init code size, Shanghai on |
//! | `max_memory_size` | 16 MB | Memory expansion |
//! | `execution_timeout_ms` | 10,000 | Per-call deadline |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `SnapshotProvider` | Accounts, storage, tokens, relationships, NFTs |
//! | `UsagePricesProvider` | Fee schedule by timestamp |
//! | `HbarCentExchange` | Exchange rate by timestamp |
//! | `BlockHashOracle` | BLOCKHASH |
//! | `PrngSeedSource` | PREVRANDAO and the PRNG system contract |
//!
//! ## Usage Example
//!
//! ```ignore
//! use mirror_evm::prelude::*;
//!
//! let service = SimulationService::new(EvmProperties::from_env()?, deps)?;
//! let result = service
//!     .call(CallRequest::new(sender, Some(contract), calldata, block))
//!     .await?;
//!
//! if result.success {
//!     println!("Gas used: {}", result.gas_used);
//! }
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod evm;
pub mod metrics;
pub mod ports;
pub mod precompile;
pub mod pricing;
pub mod service;
pub mod state;
pub mod telemetry;
pub mod usage;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        Account, BlockContext, ExecutionContext, ExecutionResult, Log, OpcodeStep, TokenInfo,
        TokenRelationship, TraceOptions, TracerType, VmConfig,
    };

    // Value objects
    pub use crate::domain::value_objects::{
        Address, Bytes, EntityId, Hash, SemanticVersion, StorageKey, StorageValue, Timestamp,
        U256,
    };

    // Ports
    pub use crate::ports::inbound::{CallRequest, SimulationApi};
    pub use crate::ports::outbound::{
        BlockHashOracle, EntityAddressSequencer, HbarCentExchange, PrngSeedSource,
        SnapshotProvider, UsagePricesProvider,
    };

    // Errors
    pub use crate::errors::{
        ConfigError, ExceptionalHaltReason, PrecompileError, PricingError, ResponseCode,
        StateError, VmError,
    };

    // Configuration
    pub use crate::config::{EvmProperties, TelemetryConfig, VersionEntry};

    // EVM components
    pub use crate::evm::{
        Interpreter, LedgerGasCalculator, Opcode, VersionRegistry, VersionedOperationSet,
    };

    // State
    pub use crate::state::{StackedUpdater, WorldStateView, WorldView};

    // Adapters
    pub use crate::adapters::{
        CachedSnapshot, InMemoryBlockHashes, InMemorySnapshot, StaticExchangeRates,
        StaticFeeSchedule,
    };

    // Service
    pub use crate::service::{
        create_test_service, ServiceDependencies, ServiceStats, SimulationService,
    };
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
