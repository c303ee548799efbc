//! # Token Precompile Dispatcher
//!
//! Intercepts calls to the token service (`0x167`), to token addresses
//! (ERC redirect) and to the exchange-rate and PRNG system contracts, and
//! runs native logic in place of bytecode.
//!
//! ## Call Lifecycle
//!
//! 1. Look up the 4-byte selector; unknown selectors revert.
//! 2. Decode the input into a synthetic transaction body.
//! 3. Price the call; fail with out-of-gas above the frame's budget.
//! 4. Run the token logic in a child updater; commit on success, revert
//!    on any business failure so batches apply atomically.
//! 5. Encode the run result into the function's declared output tuple.
//!
//! View functions skip step 4's child frame and never touch the journal.

pub mod abi;
pub mod codec;
pub mod pricing;
pub mod token_logic;

pub use codec::{BodyParams, OutputKind, RunResult};
pub use pricing::{GasCostType, PrecompilePricing, VIEW_MINIMUM_GAS};

use crate::domain::transactions::TransactionBody;
use crate::domain::value_objects::{Address, Bytes, Hash, Timestamp, U256};
use crate::errors::PrecompileError;
use crate::metrics;
use crate::pricing::tinycents_to_tinybars;
use crate::state::{StackedUpdater, WorldView};
use abi::{ParamType, Selector, Token};
use codec::{ApproveDecodedNftInfo, ApproveParams, ErcTransferParams};
use std::collections::HashMap;
use tracing::debug;

/// Gas charged by the exchange-rate system contract.
pub const EXCHANGE_RATE_GAS: u64 = 100;

/// Outcome of a precompile invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileCallResult {
    /// Gas charged.
    pub gas_cost: u64,
    /// ABI-encoded output.
    pub output: Bytes,
    /// Whether the call wrote to the frame.
    pub state_changed: bool,
}

/// Frame facts a precompile needs.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Caller of the precompile frame.
    pub sender: Address,
    /// Block timestamp prices are read at.
    pub timestamp: Timestamp,
    /// Gas available to the precompile frame.
    pub gas_limit: u64,
    /// Whether the frame is static.
    pub is_static: bool,
}

// =============================================================================
// FUNCTION TABLE
// =============================================================================

/// Every function the dispatcher serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenFunction {
    /// `associateToken(address,address)`
    AssociateToken,
    /// `associateTokens(address,address[])`
    AssociateTokens,
    /// `dissociateToken(address,address)`
    DissociateToken,
    /// `dissociateTokens(address,address[])`
    DissociateTokens,
    /// `mintToken(address,uint64,bytes[])`
    MintToken,
    /// `burnToken(address,uint64,int64[])`
    BurnToken,
    /// `wipeTokenAccount(address,address,uint32)`
    WipeTokenAccount,
    /// `wipeTokenAccountNFT(address,address,int64[])`
    WipeTokenAccountNft,
    /// `transferToken(address,address,address,int64)`
    TransferToken,
    /// `transferNFT(address,address,address,int64)`
    TransferNft,
    /// `transferTokens(address,address[],int64[])`
    TransferTokens,
    /// `approve(address,address,uint256)`
    Approve,
    /// `approveNFT(address,address,uint256)`
    ApproveNft,
    /// `getApproved(address,uint256)`
    GetApproved,
    /// `createFungibleToken(string,string,address,uint64,uint32)`
    CreateFungibleToken,
    /// Redirected `approve(address,uint256)`
    ErcApprove,
    /// Redirected `transfer(address,uint256)`
    ErcTransfer,
    /// Redirected `transferFrom(address,address,uint256)`
    ErcTransferFrom,
    /// Redirected `getApproved(uint256)`
    ErcGetApproved,
}

impl TokenFunction {
    /// Functions served at the token service address.
    pub const TOKEN_SERVICE: [Self; 15] = [
        Self::AssociateToken,
        Self::AssociateTokens,
        Self::DissociateToken,
        Self::DissociateTokens,
        Self::MintToken,
        Self::BurnToken,
        Self::WipeTokenAccount,
        Self::WipeTokenAccountNft,
        Self::TransferToken,
        Self::TransferNft,
        Self::TransferTokens,
        Self::Approve,
        Self::ApproveNft,
        Self::GetApproved,
        Self::CreateFungibleToken,
    ];

    /// Functions served at token addresses.
    pub const REDIRECT: [Self; 4] = [
        Self::ErcApprove,
        Self::ErcTransfer,
        Self::ErcTransferFrom,
        Self::ErcGetApproved,
    ];

    /// Solidity signature.
    #[must_use]
    pub const fn signature(self) -> &'static str {
        match self {
            Self::AssociateToken => "associateToken(address,address)",
            Self::AssociateTokens => "associateTokens(address,address[])",
            Self::DissociateToken => "dissociateToken(address,address)",
            Self::DissociateTokens => "dissociateTokens(address,address[])",
            Self::MintToken => "mintToken(address,uint64,bytes[])",
            Self::BurnToken => "burnToken(address,uint64,int64[])",
            Self::WipeTokenAccount => "wipeTokenAccount(address,address,uint32)",
            Self::WipeTokenAccountNft => "wipeTokenAccountNFT(address,address,int64[])",
            Self::TransferToken => "transferToken(address,address,address,int64)",
            Self::TransferNft => "transferNFT(address,address,address,int64)",
            Self::TransferTokens => "transferTokens(address,address[],int64[])",
            Self::Approve => "approve(address,address,uint256)",
            Self::ApproveNft => "approveNFT(address,address,uint256)",
            Self::GetApproved => "getApproved(address,uint256)",
            Self::CreateFungibleToken => "createFungibleToken(string,string,address,uint64,uint32)",
            Self::ErcApprove => "approve(address,uint256)",
            Self::ErcTransfer => "transfer(address,uint256)",
            Self::ErcTransferFrom => "transferFrom(address,address,uint256)",
            Self::ErcGetApproved => "getApproved(uint256)",
        }
    }

    /// Function name without the parameter list.
    #[must_use]
    pub fn name(self) -> &'static str {
        let signature = self.signature();
        signature.split('(').next().unwrap_or(signature)
    }

    /// 4-byte selector.
    #[must_use]
    pub fn selector(self) -> Selector {
        abi::selector(self.signature())
    }

    /// Declared output tuple.
    #[must_use]
    pub const fn output(self) -> OutputKind {
        match self {
            Self::MintToken => OutputKind::Mint,
            Self::BurnToken => OutputKind::Burn,
            Self::Approve => OutputKind::Approve,
            Self::GetApproved => OutputKind::GetApproved,
            Self::CreateFungibleToken => OutputKind::Create,
            Self::ErcApprove | Self::ErcTransfer | Self::ErcTransferFrom => OutputKind::ErcBool,
            Self::ErcGetApproved => OutputKind::ErcAddress,
            _ => OutputKind::Status,
        }
    }

    /// True for functions that only read.
    #[must_use]
    pub const fn is_view(self) -> bool {
        matches!(self, Self::GetApproved | Self::ErcGetApproved)
    }
}

/// A decoded call: a synthetic transaction to apply, or a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedCall {
    /// State-changing call with its minimum-price class.
    Write(TransactionBody, GasCostType),
    /// Spender query.
    GetApproved(ApproveDecodedNftInfo),
}

fn marked_approvals(
    mut wrapper: codec::CryptoTransferWrapper,
    caller: &Address,
) -> codec::CryptoTransferWrapper {
    for list in &mut wrapper.token_transfers {
        for leg in &mut list.transfers {
            leg.is_approval = leg.amount < 0 && leg.account != *caller;
        }
        for leg in &mut list.nft_transfers {
            leg.is_approval = leg.sender != *caller;
        }
    }
    wrapper
}

impl TokenFunction {
    /// Decodes `input` into the call this function describes.
    ///
    /// # Errors
    ///
    /// `Decode` for malformed input.
    pub fn decode(
        self,
        input: &[u8],
        params: &BodyParams,
        sender: &Address,
    ) -> Result<DecodedCall, PrecompileError> {
        use DecodedCall::Write;
        let sel = self.selector();
        let own_approval = |is_fungible| ApproveParams {
            token: Address::ZERO,
            sender: *sender,
            owner: *sender,
            is_fungible,
        };
        Ok(match self {
            Self::AssociateToken | Self::AssociateTokens => Write(
                TransactionBody::TokenAssociateToAccount(codec::decode_relations(
                    sel,
                    input,
                    self == Self::AssociateTokens,
                )?),
                GasCostType::Associate,
            ),
            Self::DissociateToken | Self::DissociateTokens => Write(
                TransactionBody::TokenDissociateFromAccount(codec::decode_relations(
                    sel,
                    input,
                    self == Self::DissociateTokens,
                )?),
                GasCostType::Dissociate,
            ),
            Self::MintToken => {
                let body = codec::decode_mint(sel, input)?;
                let cost = if body.metadata.is_empty() {
                    GasCostType::MintFungible
                } else {
                    GasCostType::MintNft
                };
                Write(TransactionBody::TokenMint(body), cost)
            }
            Self::BurnToken => {
                let body = codec::decode_burn(sel, input)?;
                let cost = if body.serials.is_empty() {
                    GasCostType::BurnFungible
                } else {
                    GasCostType::BurnNft
                };
                Write(TransactionBody::TokenBurn(body), cost)
            }
            Self::WipeTokenAccount => Write(
                TransactionBody::TokenAccountWipe(codec::decode_wipe(sel, input)?),
                GasCostType::WipeFungible,
            ),
            Self::WipeTokenAccountNft => Write(
                TransactionBody::TokenAccountWipe(codec::decode_wipe_nft(sel, input)?),
                GasCostType::WipeNft,
            ),
            Self::TransferToken | Self::TransferNft => {
                let nft = self == Self::TransferNft;
                let wrapper = marked_approvals(codec::decode_transfer(sel, input, nft)?, sender);
                let cost = if nft {
                    GasCostType::TransferNft
                } else {
                    GasCostType::TransferFungible
                };
                Write(TransactionBody::CryptoTransfer(wrapper.into_body()), cost)
            }
            Self::TransferTokens => {
                let wrapper = marked_approvals(codec::decode_transfer_tokens(sel, input)?, sender);
                Write(
                    TransactionBody::CryptoTransfer(wrapper.into_body()),
                    GasCostType::TransferFungible,
                )
            }
            Self::Approve | Self::ApproveNft => Write(
                TransactionBody::CryptoApproveAllowance(codec::decode_approve(
                    sel,
                    input,
                    &own_approval(self == Self::Approve),
                    false,
                )?),
                GasCostType::Approve,
            ),
            Self::GetApproved => DecodedCall::GetApproved(codec::decode_get_approved(sel, input, None)?),
            Self::CreateFungibleToken => Write(
                TransactionBody::TokenCreate(codec::decode_create_fungible(sel, input)?),
                GasCostType::Create,
            ),
            Self::ErcApprove => match params {
                BodyParams::Approve(approve) => Write(
                    TransactionBody::CryptoApproveAllowance(codec::decode_approve(
                        sel, input, approve, true,
                    )?),
                    GasCostType::Approve,
                ),
                _ => return Err(missing_params(self)),
            },
            Self::ErcTransfer | Self::ErcTransferFrom => match params {
                BodyParams::ErcTransfer(transfer) => {
                    let wrapper = codec::decode_erc_transfer(
                        input,
                        transfer,
                        self == Self::ErcTransferFrom,
                    )?;
                    let cost = if transfer.is_nft {
                        GasCostType::TransferNft
                    } else {
                        GasCostType::TransferFungible
                    };
                    Write(TransactionBody::CryptoTransfer(wrapper.into_body()), cost)
                }
                _ => return Err(missing_params(self)),
            },
            Self::ErcGetApproved => match params {
                BodyParams::Approve(approve) => DecodedCall::GetApproved(
                    codec::decode_get_approved(sel, input, Some(approve.token))?,
                ),
                _ => return Err(missing_params(self)),
            },
        })
    }
}

fn missing_params(function: TokenFunction) -> PrecompileError {
    PrecompileError::Decode(format!("{} needs a token context", function.name()))
}

/// Applies a decoded body to `frame`.
///
/// # Errors
///
/// `Failed` with the token logic's response code.
pub fn run(
    frame: &mut StackedUpdater<'_>,
    body: &TransactionBody,
    sender: &Address,
) -> Result<RunResult, PrecompileError> {
    Ok(match body {
        TransactionBody::TokenAssociateToAccount(b) => {
            token_logic::associate(frame, b)?;
            RunResult::Status
        }
        TransactionBody::TokenDissociateFromAccount(b) => {
            token_logic::dissociate(frame, b)?;
            RunResult::Status
        }
        TransactionBody::TokenMint(b) => RunResult::Mint(token_logic::mint(frame, b)?),
        TransactionBody::TokenBurn(b) => RunResult::Burn(token_logic::burn(frame, b)?),
        TransactionBody::TokenAccountWipe(b) => RunResult::Wipe(token_logic::wipe(frame, b)?),
        TransactionBody::CryptoTransfer(b) => {
            token_logic::transfer(frame, b, sender)?;
            RunResult::Status
        }
        TransactionBody::CryptoApproveAllowance(b) => {
            token_logic::approve(frame, b)?;
            RunResult::Approve { approved: true }
        }
        TransactionBody::TokenCreate(b) => {
            RunResult::Create(token_logic::create_fungible(frame, b, sender)?)
        }
        other => {
            return Err(PrecompileError::Decode(format!(
                "no token logic for {other:?}"
            )))
        }
    })
}

// =============================================================================
// DISPATCHER
// =============================================================================

fn read_selector(input: &[u8]) -> Result<Selector, PrecompileError> {
    input
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| PrecompileError::Decode(format!("input of {} bytes has no selector", input.len())))
}

/// Selector tables plus pricing.
pub struct TokenPrecompileDispatcher {
    service: HashMap<Selector, TokenFunction>,
    redirect: HashMap<Selector, TokenFunction>,
    pricing: PrecompilePricing,
}

impl TokenPrecompileDispatcher {
    /// Builds the selector tables.
    pub fn new(pricing: PrecompilePricing) -> Self {
        let table = |functions: &[TokenFunction]| {
            functions.iter().map(|f| (f.selector(), *f)).collect::<HashMap<_, _>>()
        };
        Self {
            service: table(&TokenFunction::TOKEN_SERVICE[..]),
            redirect: table(&TokenFunction::REDIRECT[..]),
            pricing,
        }
    }

    /// Pricing used by the handlers.
    #[must_use]
    pub fn pricing(&self) -> &PrecompilePricing {
        &self.pricing
    }

    /// Serves a call to the token service address.
    ///
    /// # Errors
    ///
    /// See [`PrecompileError`]; business failures are `Failed`.
    pub fn dispatch(
        &self,
        input: &[u8],
        frame: &mut StackedUpdater<'_>,
        ctx: &CallContext,
    ) -> Result<PrecompileCallResult, PrecompileError> {
        let selector = read_selector(input)?;
        let function = *self
            .service
            .get(&selector)
            .ok_or(PrecompileError::UnsupportedSelector(selector))?;
        self.execute(function, input, &BodyParams::None, frame, ctx)
    }

    /// Serves an ERC call made directly on a token address.
    ///
    /// # Errors
    ///
    /// See [`PrecompileError`]; an address that is not a token is
    /// `MissingEntity`.
    pub fn dispatch_redirect(
        &self,
        token: &Address,
        input: &[u8],
        frame: &mut StackedUpdater<'_>,
        ctx: &CallContext,
    ) -> Result<PrecompileCallResult, PrecompileError> {
        let selector = read_selector(input)?;
        let function = *self
            .redirect
            .get(&selector)
            .ok_or(PrecompileError::UnsupportedSelector(selector))?;
        let info = frame
            .token(token)?
            .ok_or_else(|| PrecompileError::MissingEntity(format!("token {token}")))?;
        let params = match function {
            TokenFunction::ErcTransfer | TokenFunction::ErcTransferFrom => {
                BodyParams::ErcTransfer(ErcTransferParams {
                    function_id: selector,
                    sender: ctx.sender,
                    token: *token,
                    is_nft: info.is_nft(),
                })
            }
            _ => BodyParams::Approve(ApproveParams {
                token: *token,
                sender: ctx.sender,
                owner: ctx.sender,
                is_fungible: !info.is_nft(),
            }),
        };
        self.execute(function, input, &params, frame, ctx)
    }

    fn execute(
        &self,
        function: TokenFunction,
        input: &[u8],
        params: &BodyParams,
        frame: &mut StackedUpdater<'_>,
        ctx: &CallContext,
    ) -> Result<PrecompileCallResult, PrecompileError> {
        if ctx.is_static && !function.is_view() {
            return Err(PrecompileError::StaticStateChange);
        }
        let call = function.decode(input, params, &ctx.sender)?;

        let gas_cost = match &call {
            DecodedCall::Write(body, cost) => {
                let minimum = self.pricing.minimum_price_in_tinybars(*cost, ctx.timestamp)?;
                self.pricing.compute_gas_requirement(
                    ctx.timestamp,
                    minimum,
                    body.clone(),
                    ctx.sender,
                    &*frame,
                )?
            }
            DecodedCall::GetApproved(_) => self
                .pricing
                .compute_view_function_gas(ctx.timestamp, VIEW_MINIMUM_GAS)?,
        };
        if gas_cost > ctx.gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let (result, state_changed) = match &call {
            DecodedCall::Write(body, _) => {
                let mut child = frame.updater();
                match run(&mut child, body, &ctx.sender) {
                    Ok(result) => {
                        child.commit();
                        (result, true)
                    }
                    Err(err) => {
                        child.revert();
                        debug!(function = function.name(), error = %err, "precompile failed");
                        return Err(err);
                    }
                }
            }
            DecodedCall::GetApproved(info) => (
                RunResult::GetApproved(token_logic::get_approved(&*frame, info)?),
                false,
            ),
        };

        metrics::record_precompile(function.name());
        debug!(function = function.name(), gas_cost, state_changed, "precompile dispatched");
        Ok(PrecompileCallResult {
            gas_cost,
            output: codec::encode_output(function.output(), &result),
            state_changed,
        })
    }

    // =========================================================================
    // SYSTEM CONTRACTS
    // =========================================================================

    /// Serves `tinycentsToTinybars(uint256)` and `tinybarsToTinycents(uint256)`
    /// at the rate active at the block timestamp.
    ///
    /// # Errors
    ///
    /// Unknown selectors, malformed input, or no rate for the timestamp.
    pub fn dispatch_exchange_rate(
        &self,
        input: &[u8],
        ctx: &CallContext,
    ) -> Result<PrecompileCallResult, PrecompileError> {
        if EXCHANGE_RATE_GAS > ctx.gas_limit {
            return Err(PrecompileError::OutOfGas);
        }
        let selector = read_selector(input)?;
        let to_tinybars = abi::selector("tinycentsToTinybars(uint256)");
        let to_tinycents = abi::selector("tinybarsToTinycents(uint256)");
        if selector != to_tinybars && selector != to_tinycents {
            return Err(PrecompileError::UnsupportedSelector(selector));
        }
        let amount = abi::decode_call(selector, &[ParamType::Uint], input)?
            .into_iter()
            .next()
            .ok_or_else(|| PrecompileError::Decode("missing amount".into()))?
            .into_u64()
            .and_then(|v| {
                i64::try_from(v).map_err(|_| PrecompileError::InvalidInput(format!("{v} exceeds int64")))
            })?;
        let rate = self.pricing.exchange_rate(ctx.timestamp)?;
        let converted = if selector == to_tinybars {
            tinycents_to_tinybars(amount, &rate)
        } else {
            let value = i128::from(amount) * i128::from(rate.cent_equiv)
                / i128::from(rate.hbar_equiv.max(1));
            i64::try_from(value).unwrap_or(i64::MAX)
        };
        Ok(PrecompileCallResult {
            gas_cost: EXCHANGE_RATE_GAS,
            output: Bytes::from(abi::encode(&[Token::Uint(U256::from(converted.max(0).unsigned_abs()))])),
            state_changed: false,
        })
    }

    /// Serves `getPseudorandomSeed()` with the frame's seed.
    ///
    /// # Errors
    ///
    /// Unknown selectors, insufficient gas, or missing prices.
    pub fn dispatch_prng(
        &self,
        input: &[u8],
        seed: Hash,
        ctx: &CallContext,
    ) -> Result<PrecompileCallResult, PrecompileError> {
        let selector = read_selector(input)?;
        if selector != abi::selector("getPseudorandomSeed()") {
            return Err(PrecompileError::UnsupportedSelector(selector));
        }
        let gas_cost = self.pricing.compute_minimum_gas(ctx.timestamp, GasCostType::Prng)?;
        if gas_cost > ctx.gas_limit {
            return Err(PrecompileError::OutOfGas);
        }
        Ok(PrecompileCallResult {
            gas_cost,
            output: Bytes::from_slice(seed.as_bytes()),
            state_changed: false,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemorySnapshot;
    use crate::adapters::pricing::{StaticExchangeRates, StaticFeeSchedule};
    use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship, TokenType};
    use crate::domain::transactions::Functionality;
    use crate::domain::value_objects::{StorageKey, StorageValue};
    use crate::errors::{ExceptionalHaltReason, ResponseCode, StateError, VmError};
    use crate::ports::outbound::SnapshotProvider;
    use crate::pricing::{ExchangeRate, FeeComponents, FeeData, PricesSource};
    use crate::state::{SimulatedSequencer, WorldStateView};
    use crate::usage::UsageBasedFeeCalculator;
    use abi::encode_call;
    use std::sync::Arc;

    const CONTRACT: u64 = 1001;
    const OTHER: u64 = 1002;
    const TOKEN_A: u64 = 2001;
    const TOKEN_B: u64 = 2002;
    const UNIQUE: u64 = 2003;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn dispatcher() -> TokenPrecompileDispatcher {
        let prices = FeeData {
            service: FeeComponents {
                gas: 852_000,
                max: i64::MAX,
                ..FeeComponents::default()
            },
            ..FeeData::default()
        };
        let schedule = Arc::new(StaticFeeSchedule::new().with_prices_for(
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
        ));
        let rates = Arc::new(StaticExchangeRates::fixed(ExchangeRate::new(1, 12)));
        TokenPrecompileDispatcher::new(PrecompilePricing::new(
            Arc::new(PricesSource::new(schedule.clone(), rates.clone())),
            Arc::new(UsageBasedFeeCalculator::with_default_estimators(schedule, rates)),
        ))
    }

    fn world() -> WorldStateView {
        let mut contract = Account::new_contract(addr(CONTRACT), Bytes::from_slice(&[0x00]));
        contract.num_associations = 1;
        let snapshot = InMemorySnapshot::new()
            .with_account(contract)
            .with_account(Account::new_eoa(addr(OTHER), U256::zero()))
            .with_token(TokenInfo {
                address: addr(TOKEN_A),
                treasury: addr(OTHER),
                ..TokenInfo::default()
            })
            .with_token(TokenInfo {
                address: addr(TOKEN_B),
                treasury: addr(OTHER),
                ..TokenInfo::default()
            })
            .with_token(TokenInfo {
                address: addr(UNIQUE),
                token_type: TokenType::NonFungibleUnique,
                treasury: addr(OTHER),
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
                owner: addr(OTHER),
                spender: addr(CONTRACT),
                metadata: Bytes::new(),
            });
        WorldStateView::new(
            Arc::new(snapshot),
            Arc::new(SimulatedSequencer::new(5_000)),
            true,
            Timestamp::from_seconds(1),
        )
    }

    /// Wraps a snapshot whose token lookups always fail.
    struct TokensUnreadable(InMemorySnapshot);

    impl SnapshotProvider for TokensUnreadable {
        fn account(&self, address: &Address) -> Result<Option<Account>, StateError> {
            self.0.account(address)
        }

        fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
            self.0.storage(address, key)
        }

        fn token(&self, _: &Address) -> Result<Option<TokenInfo>, StateError> {
            Err(StateError::Snapshot("db down".into()))
        }

        fn relationship(
            &self,
            account: &Address,
            token: &Address,
        ) -> Result<Option<TokenRelationship>, StateError> {
            self.0.relationship(account, token)
        }

        fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
            self.0.nft(token, serial)
        }

        fn allowance(
            &self,
            owner: &Address,
            token: &Address,
            spender: &Address,
        ) -> Result<u64, StateError> {
            self.0.allowance(owner, token, spender)
        }
    }

    fn ctx() -> CallContext {
        CallContext {
            sender: addr(CONTRACT),
            timestamp: Timestamp::from_seconds(10),
            gas_limit: 10_000_000,
            is_static: false,
        }
    }

    fn associate_tokens(tokens: &[u64]) -> Vec<u8> {
        encode_call(
            TokenFunction::AssociateTokens.selector(),
            &[
                Token::Address(addr(CONTRACT)),
                Token::Array(tokens.iter().map(|t| Token::Address(addr(*t))).collect()),
            ],
        )
    }

    #[test]
    fn test_selector_tables_are_disjoint() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.service.len(), TokenFunction::TOKEN_SERVICE.len());
        assert_eq!(dispatcher.redirect.len(), TokenFunction::REDIRECT.len());
        assert_eq!(TokenFunction::AssociateTokens.name(), "associateTokens");
    }

    #[test]
    fn test_multi_associate_failure_commits_nothing() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let result = dispatcher.dispatch(&associate_tokens(&[TOKEN_A, TOKEN_B]), &mut frame, &ctx());
        assert_eq!(
            result,
            Err(PrecompileError::Failed(ResponseCode::TokenAlreadyAssociatedToAccount))
        );
        assert!(frame.relationship(&addr(CONTRACT), &addr(TOKEN_A)).unwrap().is_none());
        assert!(frame.journal().is_empty());
    }

    #[test]
    fn test_multi_associate_success_commits_into_frame() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let result = dispatcher
            .dispatch(&associate_tokens(&[TOKEN_A, UNIQUE]), &mut frame, &ctx())
            .unwrap();
        assert!(result.state_changed);
        assert!(result.gas_cost > 0);
        assert_eq!(
            codec::decode_output(OutputKind::Status, result.output.as_slice()).unwrap(),
            RunResult::Status
        );
        assert!(frame.relationship(&addr(CONTRACT), &addr(UNIQUE)).unwrap().is_some());
    }

    #[test]
    fn test_snapshot_failure_is_not_a_business_failure() {
        let dispatcher = dispatcher();
        let snapshot = InMemorySnapshot::new()
            .with_account(Account::new_contract(addr(CONTRACT), Bytes::from_slice(&[0x00])));
        let view = WorldStateView::new(
            Arc::new(TokensUnreadable(snapshot)),
            Arc::new(SimulatedSequencer::new(5_000)),
            true,
            Timestamp::from_seconds(1),
        );
        let mut frame = view.updater();
        let err = dispatcher
            .dispatch(&associate_tokens(&[TOKEN_A]), &mut frame, &ctx())
            .unwrap_err();
        assert_eq!(err, PrecompileError::State(StateError::Snapshot("db down".into())));
        assert!(VmError::from(err).is_abort());
        assert!(frame.journal().is_empty());
    }

    #[test]
    fn test_unknown_ids_surface_as_missing_entity() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let unknown_token = dispatcher
            .dispatch(&associate_tokens(&[7777]), &mut frame, &ctx())
            .unwrap_err();
        let unknown_account = encode_call(
            TokenFunction::AssociateToken.selector(),
            &[Token::Address(addr(8888)), Token::Address(addr(TOKEN_A))],
        );
        let unknown_account = dispatcher
            .dispatch(&unknown_account, &mut frame, &ctx())
            .unwrap_err();

        for err in [unknown_token, unknown_account] {
            assert!(matches!(err, PrecompileError::MissingEntity(_)), "{err:?}");
            assert_eq!(
                VmError::from(err).halt_reason(),
                Some(ExceptionalHaltReason::MissingEntity)
            );
        }
        assert!(frame.journal().is_empty());
    }

    #[test]
    fn test_unknown_selector_and_short_input() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        assert_eq!(
            dispatcher.dispatch(&[1, 2, 3, 4], &mut frame, &ctx()),
            Err(PrecompileError::UnsupportedSelector([1, 2, 3, 4]))
        );
        assert!(matches!(
            dispatcher.dispatch(&[1, 2], &mut frame, &ctx()),
            Err(PrecompileError::Decode(_))
        ));
    }

    #[test]
    fn test_static_frame_rejects_writes_but_serves_views() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let static_ctx = CallContext {
            is_static: true,
            ..ctx()
        };
        assert_eq!(
            dispatcher.dispatch(&associate_tokens(&[TOKEN_A]), &mut frame, &static_ctx),
            Err(PrecompileError::StaticStateChange)
        );

        let query = encode_call(
            TokenFunction::GetApproved.selector(),
            &[Token::Address(addr(UNIQUE)), Token::Uint(U256::one())],
        );
        let result = dispatcher.dispatch(&query, &mut frame, &static_ctx).unwrap();
        assert!(!result.state_changed);
        assert_eq!(
            codec::decode_output(OutputKind::GetApproved, result.output.as_slice()).unwrap(),
            RunResult::GetApproved(codec::GetApprovedResult {
                spender: addr(CONTRACT)
            })
        );
        assert!(frame.journal().is_empty());
    }

    #[test]
    fn test_insufficient_gas() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let poor = CallContext {
            gas_limit: 10,
            ..ctx()
        };
        assert_eq!(
            dispatcher.dispatch(&associate_tokens(&[TOKEN_A]), &mut frame, &poor),
            Err(PrecompileError::OutOfGas)
        );
    }

    #[test]
    fn test_redirected_get_approved() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        let input = encode_call(TokenFunction::ErcGetApproved.selector(), &[Token::Uint(U256::one())]);
        let result = dispatcher
            .dispatch_redirect(&addr(UNIQUE), &input, &mut frame, &ctx())
            .unwrap();
        assert_eq!(result.output.len(), 32);
        assert_eq!(&result.output.as_slice()[12..], addr(CONTRACT).as_bytes());
    }

    #[test]
    fn test_redirected_transfer_from_uses_nft_approval() {
        let dispatcher = dispatcher();
        let view = world();
        let mut frame = view.updater();
        // The contract becomes able to receive, then pulls serial 1 from OTHER.
        dispatcher
            .dispatch(&associate_tokens(&[UNIQUE]), &mut frame, &ctx())
            .unwrap();
        assert!(frame.relationship(&addr(OTHER), &addr(UNIQUE)).unwrap().is_none());
        frame.put_relationship(
            addr(OTHER),
            addr(UNIQUE),
            Some(TokenRelationship {
                account: addr(OTHER),
                token: addr(UNIQUE),
                balance: 1,
                kyc_granted: true,
                ..TokenRelationship::default()
            }),
        );

        let input = encode_call(
            TokenFunction::ErcTransferFrom.selector(),
            &[
                Token::Address(addr(OTHER)),
                Token::Address(addr(CONTRACT)),
                Token::Uint(U256::one()),
            ],
        );
        let result = dispatcher
            .dispatch_redirect(&addr(UNIQUE), &input, &mut frame, &ctx())
            .unwrap();
        assert_eq!(
            codec::decode_output(OutputKind::ErcBool, result.output.as_slice()).unwrap(),
            RunResult::Approve { approved: true }
        );
        assert_eq!(frame.nft(&addr(UNIQUE), 1).unwrap().unwrap().owner, addr(CONTRACT));
    }

    #[test]
    fn test_exchange_rate_contract() {
        let dispatcher = dispatcher();
        let input = encode_call(
            abi::selector("tinycentsToTinybars(uint256)"),
            &[Token::Uint(U256::from(1_200))],
        );
        let result = dispatcher.dispatch_exchange_rate(&input, &ctx()).unwrap();
        assert_eq!(result.gas_cost, EXCHANGE_RATE_GAS);
        assert_eq!(U256::from_big_endian(result.output.as_slice()), U256::from(100));
    }

    #[test]
    fn test_prng_contract_returns_seed() {
        let dispatcher = dispatcher();
        let input = abi::selector("getPseudorandomSeed()").to_vec();
        let seed = Hash::new([7; 32]);
        let result = dispatcher.dispatch_prng(&input, seed, &ctx()).unwrap();
        assert_eq!(result.output.as_slice(), seed.as_bytes());
    }
}
