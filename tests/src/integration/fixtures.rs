//! Shared builders for the integration flows and benchmarks.

use std::sync::Arc;

use mirror_evm::adapters::{
    InMemoryBlockHashes, InMemorySnapshot, StaticExchangeRates, StaticFeeSchedule,
};
use mirror_evm::config::EvmProperties;
use mirror_evm::domain::entities::{
    Account, BlockContext, Nft, TokenInfo, TokenRelationship, TokenType,
};
use mirror_evm::domain::transactions::Functionality;
use mirror_evm::domain::value_objects::{Address, Bytes, Timestamp, U256};
use mirror_evm::ports::inbound::CallRequest;
use mirror_evm::ports::outbound::SnapshotProvider;
use mirror_evm::pricing::{ExchangeRate, FeeComponents, FeeData};
use mirror_evm::service::{ServiceDependencies, SimulationService};

/// Externally owned caller.
pub const SENDER: u64 = 1002;
/// Contract under test.
pub const CONTRACT: u64 = 1001;
/// Second contract, the callee in nested-call flows.
pub const CALLEE: u64 = 2000;
/// Fungible token, not yet associated with `CONTRACT`.
pub const TOKEN_A: u64 = 2001;
/// Fungible token already associated with `CONTRACT`.
pub const TOKEN_B: u64 = 2002;
/// Non-fungible token, not yet associated with `CONTRACT`.
pub const UNIQUE: u64 = 2003;
/// Treasury of every fixture token.
pub const TREASURY: u64 = 3001;

/// Address of entity `0.0.num`.
#[must_use]
pub fn addr(num: u64) -> Address {
    Address::from_low_u64(num)
}

/// Contract account with `code`.
#[must_use]
pub fn contract(num: u64, code: &[u8]) -> Account {
    Account::new_contract(addr(num), Bytes::from_slice(code))
}

/// The sender with a large balance.
#[must_use]
pub fn funded_sender() -> Account {
    Account::new_eoa(addr(SENDER), U256::from(1_000_000_000_000u64))
}

/// Snapshot with the funded sender plus `accounts`.
#[must_use]
pub fn snapshot_with(accounts: Vec<Account>) -> InMemorySnapshot {
    accounts
        .into_iter()
        .fold(
            InMemorySnapshot::new().with_account(funded_sender()),
            InMemorySnapshot::with_account,
        )
}

/// Adds the fixture tokens to `snapshot`: `TOKEN_A`, `TOKEN_B` (already
/// associated with `CONTRACT`) and `UNIQUE` with serial 1 approved to
/// `CONTRACT`.
#[must_use]
pub fn with_tokens(snapshot: InMemorySnapshot) -> InMemorySnapshot {
    snapshot
        .with_account(Account::new_eoa(addr(TREASURY), U256::zero()))
        .with_token(TokenInfo {
            address: addr(TOKEN_A),
            treasury: addr(TREASURY),
            ..TokenInfo::default()
        })
        .with_token(TokenInfo {
            address: addr(TOKEN_B),
            treasury: addr(TREASURY),
            ..TokenInfo::default()
        })
        .with_token(TokenInfo {
            address: addr(UNIQUE),
            token_type: TokenType::NonFungibleUnique,
            treasury: addr(TREASURY),
            total_supply: 1,
            last_used_serial: 1,
            ..TokenInfo::default()
        })
        .with_relationship(TokenRelationship {
            account: addr(CONTRACT),
            token: addr(TOKEN_B),
            kyc_granted: true,
            ..TokenRelationship::default()
        })
        .with_nft(Nft {
            token: addr(UNIQUE),
            serial: 1,
            owner: addr(TREASURY),
            spender: addr(CONTRACT),
            metadata: Bytes::new(),
        })
}

/// Fee schedule pricing contract calls and the token functions at the
/// epoch.
#[must_use]
pub fn token_schedule() -> StaticFeeSchedule {
    let prices = FeeData {
        service: FeeComponents {
            gas: 852_000,
            max: i64::MAX,
            ..FeeComponents::default()
        },
        ..FeeData::default()
    };
    StaticFeeSchedule::new().with_prices_for(
        Timestamp::from_seconds(0),
        &[
            Functionality::ContractCall,
            Functionality::TokenAssociateToAccount,
            Functionality::TokenDissociateFromAccount,
            Functionality::TokenMint,
            Functionality::CryptoTransfer,
            Functionality::CryptoApproveAllowance,
            Functionality::TokenGetInfo,
        ],
        prices,
    )
}

/// Service over `snapshot` with the token schedule and a 1:12 rate.
#[must_use]
pub fn service(snapshot: InMemorySnapshot) -> SimulationService {
    service_with(snapshot, EvmProperties::default())
}

/// As [`service`], with explicit properties.
///
/// # Panics
///
/// When `properties` carries a bad version table.
#[must_use]
pub fn service_with(snapshot: InMemorySnapshot, properties: EvmProperties) -> SimulationService {
    service_over(Arc::new(snapshot), properties)
}

/// As [`service_with`], over any snapshot provider.
///
/// # Panics
///
/// When `properties` carries a bad version table.
#[must_use]
pub fn service_over(
    snapshot: Arc<dyn SnapshotProvider>,
    properties: EvmProperties,
) -> SimulationService {
    SimulationService::new(
        properties,
        ServiceDependencies {
            snapshot,
            usage_prices: Arc::new(token_schedule()),
            exchange: Arc::new(StaticExchangeRates::fixed(ExchangeRate::new(1, 12))),
            block_hashes: Arc::new(InMemoryBlockHashes::new()),
        },
    )
    .expect("default version table is valid")
}

/// Block at `seconds`.
#[must_use]
pub fn block_at(seconds: i64) -> BlockContext {
    BlockContext {
        timestamp: Timestamp::from_seconds(seconds),
        ..BlockContext::default()
    }
}

/// Call from `SENDER` to `to` in a block at second 1.
#[must_use]
pub fn call_to(to: u64, data: Vec<u8>) -> CallRequest {
    CallRequest::new(addr(SENDER), Some(addr(to)), Bytes::from(data), block_at(1))
        .with_gas_limit(1_000_000)
}

/// Word returned by a call, as a number.
#[must_use]
pub fn output_word(output: &Bytes) -> U256 {
    U256::from_big_endian(output.as_slice())
}
