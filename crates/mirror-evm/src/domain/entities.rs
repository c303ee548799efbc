//! # Core Domain Entities
//!
//! Accounts, tokens, frames and results as seen by the simulator.

use crate::domain::value_objects::{Address, Bytes, EntityId, Hash, Timestamp, U256};
use crate::errors::ExceptionalHaltReason;
use serde::{Deserialize, Serialize};

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// Execution context for one frame.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    /// Transaction sender.
    pub origin: Address,
    /// Current caller (may differ in nested calls).
    pub caller: Address,
    /// Account whose storage and balance the frame acts on.
    pub address: Address,
    /// Account whose code is executed. Differs from `address` for
    /// DELEGATECALL and CALLCODE.
    pub code_address: Address,
    /// Value transferred (tinybars).
    pub value: U256,
    /// Input data (calldata).
    pub data: Bytes,
    /// Gas limit for this frame.
    pub gas_limit: u64,
    /// Gas price in tinybars.
    pub gas_price: U256,
    /// Block context.
    pub block: BlockContext,
    /// Call depth.
    pub depth: u16,
    /// Is this a static call (no state changes allowed).
    pub is_static: bool,
}

impl ExecutionContext {
    /// Creates the root context of a call.
    #[must_use]
    pub fn new_transaction(
        origin: Address,
        to: Address,
        value: U256,
        data: Bytes,
        gas_limit: u64,
        gas_price: U256,
        block: BlockContext,
    ) -> Self {
        Self {
            origin,
            caller: origin,
            address: to,
            code_address: to,
            value,
            data,
            gas_limit,
            gas_price,
            block,
            depth: 0,
            is_static: false,
        }
    }

    /// Creates a child context for a nested CALL.
    #[must_use]
    pub fn child_call(&self, address: Address, value: U256, data: Bytes, gas: u64) -> Self {
        Self {
            origin: self.origin,
            caller: self.address,
            address,
            code_address: address,
            value,
            data,
            gas_limit: gas,
            gas_price: self.gas_price,
            block: self.block.clone(),
            depth: self.depth.saturating_add(1),
            is_static: self.is_static,
        }
    }

    /// Creates a child context for CALLCODE: foreign code, own storage.
    #[must_use]
    pub fn child_callcode(&self, code_address: Address, value: U256, data: Bytes, gas: u64) -> Self {
        Self {
            caller: self.address,
            code_address,
            value,
            ..self.child_call(self.address, value, data, gas)
        }
    }

    /// Creates a child context for DELEGATECALL. Caller, address and value
    /// are inherited.
    #[must_use]
    pub fn child_delegatecall(&self, code_address: Address, data: Bytes, gas: u64) -> Self {
        Self {
            origin: self.origin,
            caller: self.caller,
            address: self.address,
            code_address,
            value: self.value,
            data,
            gas_limit: gas,
            gas_price: self.gas_price,
            block: self.block.clone(),
            depth: self.depth.saturating_add(1),
            is_static: self.is_static,
        }
    }

    /// Creates a child context for STATICCALL.
    #[must_use]
    pub fn child_staticcall(&self, address: Address, data: Bytes, gas: u64) -> Self {
        Self {
            is_static: true,
            ..self.child_call(address, U256::zero(), data, gas)
        }
    }

    /// Creates the context for a CREATE/CREATE2 init frame.
    #[must_use]
    pub fn child_create(&self, address: Address, value: U256, gas: u64) -> Self {
        self.child_call(address, value, Bytes::new(), gas)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new_transaction(
            Address::ZERO,
            Address::ZERO,
            U256::zero(),
            Bytes::new(),
            0,
            U256::zero(),
            BlockContext::default(),
        )
    }
}

// =============================================================================
// BLOCK CONTEXT
// =============================================================================

/// Block values derived from the record file the snapshot was taken at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block number (record file index).
    pub number: u64,
    /// Consensus timestamp of the block.
    pub timestamp: Timestamp,
    /// Coinbase address (fee collection account).
    pub coinbase: Address,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee.
    pub base_fee: U256,
    /// Chain ID (EIP-155).
    pub chain_id: u64,
    /// Running hash of the record file; seeds PREVRANDAO.
    pub hash: Hash,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            timestamp: Timestamp::default(),
            coinbase: Address::from_low_u64(98),
            gas_limit: 15_000_000,
            base_fee: U256::zero(),
            chain_id: 0x128,
            hash: Hash::ZERO,
        }
    }
}

// =============================================================================
// EXECUTION RESULT
// =============================================================================

/// Result of one simulated call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether execution succeeded.
    pub success: bool,
    /// Return data.
    pub output: Bytes,
    /// Gas used.
    pub gas_used: u64,
    /// Gas refund (for SSTORE clears).
    pub gas_refund: u64,
    /// Logs emitted.
    pub logs: Vec<Log>,
    /// Revert reason (if reverted).
    pub revert_reason: Option<String>,
    /// Exceptional halt reason (if halted).
    pub halt_reason: Option<ExceptionalHaltReason>,
    /// Address allocated for a contract creation.
    pub created_address: Option<Address>,
    /// Per-step trace, populated for opcode trace requests only.
    pub opcodes: Vec<OpcodeStep>,
}

impl ExecutionResult {
    /// Creates a successful execution result.
    #[must_use]
    pub fn success(output: Bytes, gas_used: u64) -> Self {
        Self {
            success: true,
            output,
            gas_used,
            ..Self::default()
        }
    }

    /// Creates a failed execution result.
    #[must_use]
    pub fn failure(reason: impl Into<String>, gas_used: u64) -> Self {
        Self {
            success: false,
            gas_used,
            revert_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Creates a revert result with data.
    #[must_use]
    pub fn revert(data: Bytes, gas_used: u64) -> Self {
        let reason = decode_revert_reason(&data);
        Self {
            success: false,
            output: data,
            gas_used,
            revert_reason: reason,
            ..Self::default()
        }
    }

    /// Creates an exceptional-halt result.
    #[must_use]
    pub fn halted(reason: ExceptionalHaltReason, output: Bytes, gas_used: u64) -> Self {
        Self {
            success: false,
            output,
            gas_used,
            halt_reason: Some(reason),
            revert_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// Attempts to decode an `Error(string)` revert payload.
#[must_use]
pub fn decode_revert_reason(data: &Bytes) -> Option<String> {
    // Error(string) selector: 0x08c379a0
    if data.len() < 68 {
        return None;
    }
    let bytes = data.as_slice();
    if bytes[0..4] != [0x08, 0xc3, 0x79, 0xa0] {
        return None;
    }

    let offset = 4 + 32;
    let len_word = U256::from_big_endian(&bytes[offset..offset + 32]);
    if len_word > U256::from(bytes.len()) {
        return None;
    }
    let len = len_word.low_u64() as usize;
    let start = offset + 32;
    let string_bytes = bytes.get(start..start + len)?;
    String::from_utf8(string_bytes.to_vec()).ok()
}

// =============================================================================
// LOG (EVENT)
// =============================================================================

/// Emitted log (event) from contract execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Contract address that emitted the log.
    pub address: Address,
    /// Indexed topics (up to 4).
    pub topics: Vec<Hash>,
    /// Non-indexed data.
    pub data: Bytes,
}

impl Log {
    /// Creates a new log.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

// =============================================================================
// OPCODE TRACE
// =============================================================================

/// One executed interpreter step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeStep {
    /// Program counter.
    pub pc: usize,
    /// Mnemonic, e.g. `SSTORE`.
    pub op: String,
    /// Gas remaining before the step.
    pub gas: u64,
    /// Static gas charged for the step.
    pub gas_cost: u64,
    /// Frame depth.
    pub depth: u16,
    /// Stack snapshot, bottom first. Empty unless requested.
    pub stack: Vec<U256>,
    /// Memory words. Empty unless requested.
    pub memory: Vec<Hash>,
    /// Storage slot touched by SLOAD/SSTORE at this step, as (key, value).
    /// Empty unless requested.
    pub storage: Vec<(U256, U256)>,
    /// Halt or revert reason when the step ended the frame.
    pub reason: Option<String>,
}

/// Tracer selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TracerType {
    /// Record every opcode step.
    Opcode,
    /// Record only the call result.
    #[default]
    Operation,
}

/// What an opcode trace captures per step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceOptions {
    /// Capture the stack.
    pub stack: bool,
    /// Capture memory.
    pub memory: bool,
    /// Capture touched storage slots.
    pub storage: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            stack: true,
            memory: false,
            storage: false,
        }
    }
}

// =============================================================================
// VM CONFIGURATION
// =============================================================================

/// Interpreter limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmConfig {
    /// Maximum call depth (default: 1024).
    pub max_call_depth: u16,
    /// Maximum code size in bytes (EIP-170: 24KB).
    pub max_code_size: usize,
    /// Maximum init code size in bytes (EIP-3860: 48KB).
    pub max_init_code_size: usize,
    /// Maximum memory size in bytes (default: 16MB).
    pub max_memory_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            max_code_size: 24_576,
            max_init_code_size: 49_152,
            max_memory_size: 16 * 1024 * 1024,
        }
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Empty code hash (keccak256 of empty bytes).
pub const EMPTY_CODE_HASH: Hash = Hash([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// What kind of entity backs an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountKind {
    /// Externally owned account.
    #[default]
    Regular,
    /// Smart contract.
    Contract,
    /// Token pseudo-account. Carries no code; calls are redirected to the
    /// token precompile.
    Token,
}

/// An address-addressable balance/code holder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// EVM address.
    pub address: Address,
    /// Ledger id when the address maps to an entity.
    pub id: Option<EntityId>,
    /// Kind of entity.
    pub kind: AccountKind,
    /// Balance in tinybars.
    pub balance: U256,
    /// Nonce.
    pub nonce: u64,
    /// Runtime bytecode.
    pub code: Bytes,
    /// Deleted accounts are invisible to reads.
    pub deleted: bool,
    /// Expiry in consensus seconds.
    pub expiry: i64,
    /// Number of token relationships.
    pub num_associations: u32,
    /// Number of token relationships with a non-zero balance.
    pub num_positive_balances: u32,
    /// Number of tokens this account is treasury for.
    pub num_treasury_titles: u32,
    /// Number of NFTs owned.
    pub owned_nfts: u64,
}

impl Account {
    /// Creates an externally owned account.
    #[must_use]
    pub fn new_eoa(address: Address, balance: U256) -> Self {
        Self {
            address,
            id: EntityId::from_address(&address),
            balance,
            ..Self::default()
        }
    }

    /// Creates a contract account with runtime code.
    #[must_use]
    pub fn new_contract(address: Address, code: Bytes) -> Self {
        Self {
            address,
            id: EntityId::from_address(&address),
            kind: AccountKind::Contract,
            code,
            ..Self::default()
        }
    }

    /// Synthesizes the pseudo-account that stands for a token.
    #[must_use]
    pub fn token_account(address: Address) -> Self {
        Self {
            address,
            id: EntityId::from_address(&address),
            kind: AccountKind::Token,
            ..Self::default()
        }
    }

    /// True for token pseudo-accounts.
    #[must_use]
    pub fn is_token(&self) -> bool {
        self.kind == AccountKind::Token
    }

    /// Hash of the runtime code.
    #[must_use]
    pub fn code_hash(&self) -> Hash {
        if self.code.is_empty() {
            EMPTY_CODE_HASH
        } else {
            crate::domain::services::keccak256(self.code.as_slice())
        }
    }

    /// EIP-161 emptiness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Token supply model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenType {
    /// Divisible, balance-tracked token.
    #[default]
    FungibleCommon,
    /// Serial-numbered unique token.
    NonFungibleUnique,
}

/// Token metadata needed by the precompiles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token address (long-zero form of its id).
    pub address: Address,
    /// Supply model.
    pub token_type: TokenType,
    /// Treasury account.
    pub treasury: Address,
    /// Current total supply.
    pub total_supply: u64,
    /// Supply cap; zero means unbounded.
    pub max_supply: u64,
    /// Decimals.
    pub decimals: u32,
    /// Name.
    pub name: String,
    /// Symbol.
    pub symbol: String,
    /// Deleted flag.
    pub deleted: bool,
    /// Paused flag.
    pub paused: bool,
    /// Whether a supply key is set.
    pub has_supply_key: bool,
    /// Whether a wipe key is set.
    pub has_wipe_key: bool,
    /// Whether new relationships start frozen.
    pub freeze_default: bool,
    /// Highest serial number issued so far.
    pub last_used_serial: i64,
}

impl TokenInfo {
    /// True for non-fungible tokens.
    #[must_use]
    pub fn is_nft(&self) -> bool {
        self.token_type == TokenType::NonFungibleUnique
    }
}

/// Association between an account and a token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelationship {
    /// Account side.
    pub account: Address,
    /// Token side.
    pub token: Address,
    /// Balance in the token's smallest unit.
    pub balance: u64,
    /// Frozen flag.
    pub frozen: bool,
    /// KYC granted flag.
    pub kyc_granted: bool,
}

/// A single non-fungible unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    /// Token address.
    pub token: Address,
    /// Serial number.
    pub serial: i64,
    /// Current owner.
    pub owner: Address,
    /// Approved spender, zero when none.
    pub spender: Address,
    /// Metadata bytes.
    pub metadata: Bytes,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_context_child_call() {
        let parent = ExecutionContext::new_transaction(
            Address::new([1u8; 20]),
            Address::new([2u8; 20]),
            U256::from(100),
            Bytes::from_slice(&[0x01, 0x02]),
            1000,
            U256::from(1),
            BlockContext::default(),
        );

        let child = parent.child_call(
            Address::new([3u8; 20]),
            U256::from(50),
            Bytes::from_slice(&[0x03]),
            500,
        );

        assert_eq!(child.origin, parent.origin);
        assert_eq!(child.caller, Address::new([2u8; 20]));
        assert_eq!(child.address, Address::new([3u8; 20]));
        assert_eq!(child.code_address, Address::new([3u8; 20]));
        assert_eq!(child.depth, 1);
        assert!(!child.is_static);
    }

    #[test]
    fn test_execution_context_delegatecall_keeps_identity() {
        let parent = ExecutionContext::new_transaction(
            Address::new([1u8; 20]),
            Address::new([2u8; 20]),
            U256::from(7),
            Bytes::new(),
            1000,
            U256::one(),
            BlockContext::default(),
        );
        let child = parent.child_delegatecall(Address::new([9u8; 20]), Bytes::new(), 10);
        assert_eq!(child.address, parent.address);
        assert_eq!(child.caller, parent.caller);
        assert_eq!(child.value, parent.value);
        assert_eq!(child.code_address, Address::new([9u8; 20]));
    }

    #[test]
    fn test_execution_context_staticcall() {
        let parent = ExecutionContext::default();
        let child = parent.child_staticcall(Address::new([1u8; 20]), Bytes::new(), 100);
        assert!(child.is_static);
        assert!(child.value.is_zero());
    }

    #[test]
    fn test_execution_result_halted_sets_reason() {
        let result =
            ExecutionResult::halted(ExceptionalHaltReason::ContractIsTreasury, Bytes::new(), 5000);
        assert!(!result.success);
        assert_eq!(result.halt_reason, Some(ExceptionalHaltReason::ContractIsTreasury));
        assert_eq!(result.revert_reason.as_deref(), Some("CONTRACT_IS_TREASURY"));
    }

    #[test]
    fn test_decode_revert_reason() {
        let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
        let mut word = [0u8; 32];
        word[31] = 0x20;
        data.extend_from_slice(&word);
        word[31] = 4;
        data.extend_from_slice(&word);
        let mut text = [0u8; 32];
        text[..4].copy_from_slice(b"nope");
        data.extend_from_slice(&text);
        assert_eq!(decode_revert_reason(&Bytes(data)).as_deref(), Some("nope"));
        assert_eq!(decode_revert_reason(&Bytes(vec![1, 2, 3])), None);
    }

    #[test]
    fn test_token_account_has_no_code() {
        let token = Account::token_account(Address::from_low_u64(1001));
        assert!(token.is_token());
        assert!(token.code.is_empty());
        assert_eq!(token.code_hash(), EMPTY_CODE_HASH);
    }

    #[test]
    fn test_vm_config_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 1024);
        assert_eq!(config.max_code_size, 24_576);
        assert_eq!(config.max_init_code_size, 49_152);
    }
}
