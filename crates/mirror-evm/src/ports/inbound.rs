//! # Driving Ports (API - Inbound)
//!
//! The interface the RPC layer uses to run simulations. Every call is
//! read-only: state changes live in per-call updaters and are dropped when
//! the call returns.

use crate::domain::entities::{BlockContext, ExecutionResult, TraceOptions};
use crate::domain::value_objects::{Address, Bytes, SemanticVersion, U256};
use crate::errors::VmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gas limit used when a request does not name one.
pub const DEFAULT_CALL_GAS: u64 = 15_000_000;

// =============================================================================
// CALL REQUEST
// =============================================================================

/// One simulated call or contract creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallRequest {
    /// Sender address.
    pub sender: Address,
    /// Target; `None` deploys `data` as init code.
    pub to: Option<Address>,
    /// Value in tinybars.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas price in tinybars.
    pub gas_price: U256,
    /// Calldata or init code.
    pub data: Bytes,
    /// Block the call is replayed in; its timestamp selects the EVM
    /// version, fee schedule and exchange rate.
    pub block: BlockContext,
    /// Version to use instead of the one active at the block timestamp.
    pub version_hint: Option<SemanticVersion>,
    /// Run the top frame as a STATICCALL.
    pub is_static: bool,
}

impl CallRequest {
    /// A zero-value call from `sender` to `to` in `block`.
    #[must_use]
    pub fn new(sender: Address, to: Option<Address>, data: Bytes, block: BlockContext) -> Self {
        Self {
            sender,
            to,
            value: U256::zero(),
            gas_limit: DEFAULT_CALL_GAS,
            gas_price: U256::one(),
            data,
            block,
            version_hint: None,
            is_static: false,
        }
    }

    /// Sets the value.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the gas limit.
    #[must_use]
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Pins the EVM version.
    #[must_use]
    pub fn with_version_hint(mut self, version: SemanticVersion) -> Self {
        self.version_hint = Some(version);
        self
    }

    /// True for contract creation.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

// =============================================================================
// SIMULATION API (Primary Driving Port)
// =============================================================================

/// Historical call simulation.
///
/// ## Usage
///
/// ```ignore
/// let result = api.call(CallRequest::new(sender, Some(contract), data, block)).await?;
/// ```
#[async_trait]
pub trait SimulationApi: Send + Sync {
    /// Runs the call and reports its outcome. Reverts and halts are
    /// successful API calls with `success == false`.
    ///
    /// # Errors
    ///
    /// Requests over the gas cap, deadlines, and snapshot or pricing
    /// failures.
    async fn call(&self, request: CallRequest) -> Result<ExecutionResult, VmError>;

    /// Lowest gas limit under which the call succeeds.
    ///
    /// # Errors
    ///
    /// As for [`SimulationApi::call`], plus `Revert` when the call fails
    /// even at the request's gas limit.
    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, VmError>;

    /// Runs the call with an opcode tracer; the steps are in
    /// [`ExecutionResult::opcodes`].
    ///
    /// # Errors
    ///
    /// As for [`SimulationApi::call`].
    async fn trace_opcodes(
        &self,
        request: CallRequest,
        options: TraceOptions,
    ) -> Result<ExecutionResult, VmError>;
}

// =============================================================================
// TESTS
// =============================================================================
