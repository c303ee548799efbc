//! # Error Types
//!
//! Error and status types for contract simulation.
//!
//! Business-rule failures are not Rust errors at the process level: they end
//! a single frame with an [`ExceptionalHaltReason`] and the parent frame
//! decides what to do. Only [`ConfigError`] is fatal, and only at startup.

use crate::domain::value_objects::{SemanticVersion, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// RESPONSE CODES
// =============================================================================

/// Ledger status codes returned by token logic and ABI-encoded as `int64`
/// in precompile outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ResponseCode {
    Ok,
    InvalidTransactionBody,
    InvalidAccountId,
    InsufficientAccountBalance,
    Success,
    AccountFrozenForToken,
    InvalidTokenId,
    InvalidTreasuryAccountForToken,
    AccountKycNotGrantedForToken,
    InsufficientTokenBalance,
    TokenWasDeleted,
    TokenHasNoSupplyKey,
    TokenHasNoWipeKey,
    InvalidTokenMintAmount,
    InvalidTokenBurnAmount,
    TokenNotAssociatedToAccount,
    CannotWipeTokenTreasuryAccount,
    InvalidWipingAmount,
    TokenAlreadyAssociatedToAccount,
    TransactionRequiresZeroTokenBalances,
    AccountIsTreasury,
    TokenIdRepeatedInTokenList,
    EmptyTokenList,
    InvalidNftId,
    TokenMaxSupplyReached,
    SenderDoesNotOwnNftSerialNo,
    TokenIsPaused,
    SpenderDoesNotHaveAllowance,
    AmountExceedsAllowance,
    InvalidAllowanceOwnerId,
    InvalidAllowanceSpenderId,
}

impl ResponseCode {
    /// Numeric protocol value.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::InvalidTransactionBody => 7,
            Self::InvalidAccountId => 15,
            Self::Success => 22,
            Self::InsufficientAccountBalance => 28,
            Self::AccountFrozenForToken => 165,
            Self::InvalidTokenId => 167,
            Self::InvalidTreasuryAccountForToken => 170,
            Self::AccountKycNotGrantedForToken => 176,
            Self::InsufficientTokenBalance => 178,
            Self::TokenWasDeleted => 179,
            Self::TokenHasNoSupplyKey => 180,
            Self::TokenHasNoWipeKey => 181,
            Self::InvalidTokenMintAmount => 182,
            Self::InvalidTokenBurnAmount => 183,
            Self::TokenNotAssociatedToAccount => 184,
            Self::CannotWipeTokenTreasuryAccount => 185,
            Self::InvalidWipingAmount => 192,
            Self::TokenAlreadyAssociatedToAccount => 194,
            Self::TransactionRequiresZeroTokenBalances => 195,
            Self::AccountIsTreasury => 196,
            Self::TokenIdRepeatedInTokenList => 197,
            Self::EmptyTokenList => 223,
            Self::InvalidNftId => 226,
            Self::TokenMaxSupplyReached => 229,
            Self::SenderDoesNotOwnNftSerialNo => 237,
            Self::TokenIsPaused => 254,
            Self::SpenderDoesNotHaveAllowance => 292,
            Self::AmountExceedsAllowance => 293,
            Self::InvalidAllowanceOwnerId => 300,
            Self::InvalidAllowanceSpenderId => 301,
        }
    }

    /// Protocol name, e.g. `TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidTransactionBody => "INVALID_TRANSACTION_BODY",
            Self::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Self::InsufficientAccountBalance => "INSUFFICIENT_ACCOUNT_BALANCE",
            Self::Success => "SUCCESS",
            Self::AccountFrozenForToken => "ACCOUNT_FROZEN_FOR_TOKEN",
            Self::InvalidTokenId => "INVALID_TOKEN_ID",
            Self::InvalidTreasuryAccountForToken => "INVALID_TREASURY_ACCOUNT_FOR_TOKEN",
            Self::AccountKycNotGrantedForToken => "ACCOUNT_KYC_NOT_GRANTED_FOR_TOKEN",
            Self::InsufficientTokenBalance => "INSUFFICIENT_TOKEN_BALANCE",
            Self::TokenWasDeleted => "TOKEN_WAS_DELETED",
            Self::TokenHasNoSupplyKey => "TOKEN_HAS_NO_SUPPLY_KEY",
            Self::TokenHasNoWipeKey => "TOKEN_HAS_NO_WIPE_KEY",
            Self::InvalidTokenMintAmount => "INVALID_TOKEN_MINT_AMOUNT",
            Self::InvalidTokenBurnAmount => "INVALID_TOKEN_BURN_AMOUNT",
            Self::TokenNotAssociatedToAccount => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
            Self::CannotWipeTokenTreasuryAccount => "CANNOT_WIPE_TOKEN_TREASURY_ACCOUNT",
            Self::InvalidWipingAmount => "INVALID_WIPING_AMOUNT",
            Self::TokenAlreadyAssociatedToAccount => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            Self::TransactionRequiresZeroTokenBalances => {
                "TRANSACTION_REQUIRES_ZERO_TOKEN_BALANCES"
            }
            Self::AccountIsTreasury => "ACCOUNT_IS_TREASURY",
            Self::TokenIdRepeatedInTokenList => "TOKEN_ID_REPEATED_IN_TOKEN_LIST",
            Self::EmptyTokenList => "EMPTY_TOKEN_LIST",
            Self::InvalidNftId => "INVALID_NFT_ID",
            Self::TokenMaxSupplyReached => "TOKEN_MAX_SUPPLY_REACHED",
            Self::SenderDoesNotOwnNftSerialNo => "SENDER_DOES_NOT_OWN_NFT_SERIAL_NO",
            Self::TokenIsPaused => "TOKEN_IS_PAUSED",
            Self::SpenderDoesNotHaveAllowance => "SPENDER_DOES_NOT_HAVE_ALLOWANCE",
            Self::AmountExceedsAllowance => "AMOUNT_EXCEEDS_ALLOWANCE",
            Self::InvalidAllowanceOwnerId => "INVALID_ALLOWANCE_OWNER_ID",
            Self::InvalidAllowanceSpenderId => "INVALID_ALLOWANCE_SPENDER_ID",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// EXCEPTIONAL HALT REASONS
// =============================================================================

/// Abnormal frame termination cause. Distinct from a revert: the frame's
/// journal is discarded and, for interpreter faults, its gas is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionalHaltReason {
    /// SELFDESTRUCT named the executing contract as beneficiary.
    SelfDestructToSelf,
    /// SELFDESTRUCT on a contract that is treasury for some token.
    ContractIsTreasury,
    /// SELFDESTRUCT on a contract holding a non-zero token balance.
    TransactionRequiresZeroTokenBalances,
    /// SELFDESTRUCT on a contract that still owns NFTs.
    ContractStillOwnsNfts,
    /// Target or beneficiary address does not exist or was deleted.
    InvalidSolidityAddress,
    /// Gas exhausted.
    InsufficientGas,
    /// Opcode not defined for the active spec.
    InvalidOperation,
    /// State mutation attempted in a static frame.
    IllegalStateChange,
    /// Stack exceeded 1024 items.
    TooManyStackItems,
    /// Stack underflow.
    InsufficientStackItems,
    /// JUMP/JUMPI to a non-JUMPDEST.
    InvalidJumpDestination,
    /// Memory, return data or code size out of bounds.
    OutOfBounds,
    /// Referenced account or token does not exist.
    MissingEntity,
    /// Native token logic rejected the operation.
    PrecompileFailure(ResponseCode),
}

impl ExceptionalHaltReason {
    /// Protocol tag, e.g. `SELF_DESTRUCT_TO_SELF`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::SelfDestructToSelf => "SELF_DESTRUCT_TO_SELF",
            Self::ContractIsTreasury => "CONTRACT_IS_TREASURY",
            Self::TransactionRequiresZeroTokenBalances => {
                "TRANSACTION_REQUIRES_ZERO_TOKEN_BALANCES"
            }
            Self::ContractStillOwnsNfts => "CONTRACT_STILL_OWNS_NFTS",
            Self::InvalidSolidityAddress => "INVALID_SOLIDITY_ADDRESS",
            Self::InsufficientGas => "INSUFFICIENT_GAS",
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::IllegalStateChange => "ILLEGAL_STATE_CHANGE",
            Self::TooManyStackItems => "TOO_MANY_STACK_ITEMS",
            Self::InsufficientStackItems => "INSUFFICIENT_STACK_ITEMS",
            Self::InvalidJumpDestination => "INVALID_JUMP_DESTINATION",
            Self::OutOfBounds => "OUT_OF_BOUNDS",
            Self::MissingEntity => "MISSING_ENTITY",
            Self::PrecompileFailure(_) => "PRECOMPILE_FAILURE",
        }
    }
}

impl fmt::Display for ExceptionalHaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrecompileFailure(code) => write!(f, "{}({code})", self.tag()),
            other => f.write_str(other.tag()),
        }
    }
}

// =============================================================================
// VM ERRORS
// =============================================================================

/// Errors that can occur during EVM execution.
#[derive(Debug, Error, Clone)]
pub enum VmError {
    /// Execution ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Stack overflow (>1024 items).
    #[error("stack overflow")]
    StackOverflow,

    /// Stack underflow (pop from empty stack).
    #[error("stack underflow")]
    StackUnderflow,

    /// Opcode undefined for the active spec.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    /// Invalid jump destination.
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Contract code size exceeded limit.
    #[error("code size exceeded: {size} > {max} bytes")]
    CodeSizeExceeded {
        /// Deployed size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Init code size exceeded limit (EIP-3860).
    #[error("init code size exceeded: {size} > {max} bytes")]
    InitCodeSizeExceeded {
        /// Init code size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Attempted to modify state in static context.
    #[error("write operation in static context")]
    WriteInStaticContext,

    /// Insufficient balance for transfer.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Value to move.
        required: U256,
        /// Sender balance.
        available: U256,
    },

    /// State access error.
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    /// Execution reverted.
    #[error("revert: {0}")]
    Revert(String),

    /// Exceptional halt raised by a chain-specific operation.
    #[error("halt: {0}")]
    Halt(ExceptionalHaltReason),

    /// Memory expansion would exceed limit.
    #[error("memory limit exceeded: {requested} > {max} bytes")]
    MemoryLimitExceeded {
        /// Requested size.
        requested: usize,
        /// Configured limit.
        max: usize,
    },

    /// Return data out of bounds (RETURNDATACOPY).
    #[error("return data out of bounds: offset {offset}, size {size}, available {available}")]
    ReturnDataOutOfBounds {
        /// Copy offset.
        offset: usize,
        /// Copy size.
        size: usize,
        /// Buffer length.
        available: usize,
    },

    /// Code starts with 0xEF (reserved for EOF).
    #[error("code starts with 0xEF byte (reserved for EOF)")]
    InvalidCodePrefix,

    /// Caller aborted the call between opcode steps.
    #[error("execution cancelled")]
    Cancelled,

    /// Execution timeout exceeded.
    #[error("execution timeout: {elapsed_ms}ms > {max_ms}ms")]
    Timeout {
        /// Time spent.
        elapsed_ms: u64,
        /// Configured deadline.
        max_ms: u64,
    },

    /// Request asked for more gas than the engine allows.
    #[error("gas limit {requested} exceeds maximum {max}")]
    GasLimitExceeded {
        /// Requested gas limit.
        requested: u64,
        /// Configured cap.
        max: u64,
    },

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VmError {
    /// Returns true if this error is recoverable (can continue execution).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Revert(_))
    }

    /// Returns true if this error consumes all gas.
    #[must_use]
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(
            self,
            Self::Revert(_) | Self::Halt(ExceptionalHaltReason::PrecompileFailure(_))
        )
    }

    /// True for failures that end the whole call rather than one frame:
    /// cancellation, deadlines, snapshot failures and internal faults.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Timeout { .. }
                | Self::Internal(_)
                | Self::StateError(StateError::Snapshot(_) | StateError::Unsupported(_))
        )
    }

    /// Maps the error to the halt reason reported to callers. Reverts and
    /// aborts carry no halt reason.
    #[must_use]
    pub fn halt_reason(&self) -> Option<ExceptionalHaltReason> {
        let reason = match self {
            Self::OutOfGas => ExceptionalHaltReason::InsufficientGas,
            Self::StackOverflow => ExceptionalHaltReason::TooManyStackItems,
            Self::StackUnderflow => ExceptionalHaltReason::InsufficientStackItems,
            Self::InvalidOpcode(_) | Self::InvalidCodePrefix => {
                ExceptionalHaltReason::InvalidOperation
            }
            Self::InvalidJump(_) => ExceptionalHaltReason::InvalidJumpDestination,
            Self::CodeSizeExceeded { .. }
            | Self::InitCodeSizeExceeded { .. }
            | Self::MemoryLimitExceeded { .. }
            | Self::ReturnDataOutOfBounds { .. } => ExceptionalHaltReason::OutOfBounds,
            Self::WriteInStaticContext => ExceptionalHaltReason::IllegalStateChange,
            Self::StateError(StateError::MissingEntity(_)) => ExceptionalHaltReason::MissingEntity,
            Self::Halt(reason) => *reason,
            Self::InsufficientBalance { .. }
            | Self::StateError(_)
            | Self::Revert(_)
            | Self::Cancelled
            | Self::Timeout { .. }
            | Self::GasLimitExceeded { .. }
            | Self::Internal(_) => return None,
        };
        Some(reason)
    }
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from the world state and the snapshot behind it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Referenced account, contract or token id does not exist.
    #[error("missing entity: {0}")]
    MissingEntity(String),

    /// Operation has no meaning on a simulation view.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The snapshot provider failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

// =============================================================================
// PRECOMPILE ERRORS
// =============================================================================

/// Errors from precompiled contract execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    /// Malformed ABI input.
    #[error("failed to decode precompile input: {0}")]
    Decode(String),

    /// No handler is registered for the selector.
    #[error("unsupported operation: selector 0x{}", hex4(.0))]
    UnsupportedSelector([u8; 4]),

    /// Token logic rejected the operation.
    #[error("precompile failed: {0}")]
    Failed(ResponseCode),

    /// Referenced account or token does not exist.
    #[error("missing entity: {0}")]
    MissingEntity(String),

    /// Invalid input data for a standard precompile.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Out of gas during precompile execution.
    #[error("precompile out of gas")]
    OutOfGas,

    /// State-changing function called from a static frame.
    #[error("state change in static context")]
    StaticStateChange,

    /// The world state behind the frame failed; ends the whole call.
    #[error(transparent)]
    State(StateError),
}

fn hex4(bytes: &[u8; 4]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<StateError> for PrecompileError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::MissingEntity(what) => PrecompileError::MissingEntity(what),
            other => PrecompileError::State(other),
        }
    }
}

impl From<PrecompileError> for VmError {
    fn from(err: PrecompileError) -> Self {
        match err {
            PrecompileError::OutOfGas => VmError::OutOfGas,
            PrecompileError::StaticStateChange => {
                VmError::Halt(ExceptionalHaltReason::IllegalStateChange)
            }
            PrecompileError::Failed(code) => {
                VmError::Halt(ExceptionalHaltReason::PrecompileFailure(code))
            }
            PrecompileError::MissingEntity(what) => {
                VmError::StateError(StateError::MissingEntity(what))
            }
            PrecompileError::State(err) => VmError::StateError(err),
            _ => VmError::Revert(err.to_string()),
        }
    }
}

// =============================================================================
// PRICING ERRORS
// =============================================================================

/// Errors from fee schedule and exchange rate lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// No fee schedule covers the timestamp.
    #[error("no fee schedule for {function} at {seconds}s")]
    MissingFeeSchedule {
        /// Priced functionality.
        function: String,
        /// Consensus second.
        seconds: i64,
    },

    /// No exchange rate covers the timestamp.
    #[error("no exchange rate at {0}s")]
    MissingExchangeRate(i64),

    /// Exchange rate with a zero cent equivalent.
    #[error("invalid exchange rate: {hbar_equiv}/{cent_equiv}")]
    InvalidExchangeRate {
        /// Hbar side.
        hbar_equiv: i32,
        /// Cent side.
        cent_equiv: i32,
    },

    /// Transaction kind has no fee function.
    #[error("unknown transaction kind: {0}")]
    UnknownFunction(String),

    /// A state lookup needed for the estimate failed.
    #[error("state lookup failed: {0}")]
    State(#[from] StateError),
}

impl From<PricingError> for VmError {
    fn from(err: PricingError) -> Self {
        VmError::Internal(err.to_string())
    }
}

impl From<PricingError> for PrecompileError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::State(err) => err.into(),
            other => PrecompileError::InvalidInput(other.to_string()),
        }
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Startup-time configuration errors. These are the only fatal errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Version table has no entries.
    #[error("version table is empty")]
    EmptyVersionTable,

    /// Version table is not strictly increasing in effective time.
    #[error("version table not ordered at {0}")]
    UnorderedVersionTable(SemanticVersion),

    /// Version has no registered operation set.
    #[error("unregistered protocol version: {0}")]
    UnknownVersion(SemanticVersion),

    /// An environment variable could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
