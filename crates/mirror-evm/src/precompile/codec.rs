//! # Token Service Codec
//!
//! Decodes token-service ABI calls into synthetic transaction bodies and
//! encodes run results into the output tuple each function declares.

use super::abi::{self, array_of, ParamType, Selector, Token};
use crate::domain::transactions::{
    AccountAmount, ApproveAllowanceBody, CryptoTransferBody, NftAllowance, NftTransfer,
    TokenAllowance, TokenBurnBody, TokenCreateBody, TokenMintBody, TokenRelationsBody,
    TokenTransferList, TokenWipeBody,
};
use crate::domain::entities::TokenType;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::{PrecompileError, ResponseCode};

// =============================================================================
// BODY PARAMETERS
// =============================================================================

/// Context for an approval: which token, who calls, on whose behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApproveParams {
    /// Token address; for redirected calls the address that was called.
    pub token: Address,
    /// Calling contract or account.
    pub sender: Address,
    /// Owner granting the allowance.
    pub owner: Address,
    /// Fungible allowance when true, NFT approval otherwise.
    pub is_fungible: bool,
}

/// Context for an ERC-20/721 `transfer`/`transferFrom` on a token address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErcTransferParams {
    /// Redirected selector.
    pub function_id: Selector,
    /// Calling contract or account.
    pub sender: Address,
    /// Token address that was called.
    pub token: Address,
    /// Whether the token is non-fungible.
    pub is_nft: bool,
}

/// Context for a token create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateParams {
    /// Selector of the create variant.
    pub function_id: Selector,
    /// Sponsoring account; new token addresses are drawn for it.
    pub account: Address,
}

/// Extra call context some decoders need.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BodyParams {
    /// Input alone is enough.
    #[default]
    None,
    /// Approval context.
    Approve(ApproveParams),
    /// Redirected transfer context.
    ErcTransfer(ErcTransferParams),
    /// Create context.
    Create(CreateParams),
}

/// Decoded `getApproved` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApproveDecodedNftInfo {
    /// Token address.
    pub token: Address,
    /// Serial number.
    pub serial: U256,
}

/// Decoded transfer, before it becomes a crypto-transfer body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CryptoTransferWrapper {
    /// Hbar legs.
    pub hbar_transfers: Vec<AccountAmount>,
    /// Token legs.
    pub token_transfers: Vec<TokenTransferList>,
}

impl CryptoTransferWrapper {
    /// Single fungible leg pair.
    #[must_use]
    pub fn fungible(token: Address, from: Address, to: Address, amount: i64, is_approval: bool) -> Self {
        Self {
            hbar_transfers: Vec::new(),
            token_transfers: vec![TokenTransferList {
                token,
                transfers: vec![
                    AccountAmount {
                        account: from,
                        amount: amount.saturating_neg(),
                        is_approval,
                    },
                    AccountAmount {
                        account: to,
                        amount,
                        is_approval: false,
                    },
                ],
                nft_transfers: Vec::new(),
            }],
        }
    }

    /// Single NFT move.
    #[must_use]
    pub fn nft(token: Address, from: Address, to: Address, serial: i64, is_approval: bool) -> Self {
        Self {
            hbar_transfers: Vec::new(),
            token_transfers: vec![TokenTransferList {
                token,
                transfers: Vec::new(),
                nft_transfers: vec![NftTransfer {
                    sender: from,
                    receiver: to,
                    serial,
                    is_approval,
                }],
            }],
        }
    }

    /// The synthetic crypto-transfer body.
    #[must_use]
    pub fn into_body(self) -> CryptoTransferBody {
        CryptoTransferBody {
            hbar_transfers: self.hbar_transfers,
            token_transfers: self.token_transfers,
        }
    }
}

// =============================================================================
// RUN RESULTS
// =============================================================================

/// New token created by a create call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenCreateResult {
    /// Token address.
    pub token: Address,
}

/// Supply after a burn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BurnResult {
    /// New total supply.
    pub total_supply: u64,
    /// Burned serials, empty for fungible burns.
    pub serials: Vec<i64>,
}

/// Supply after a wipe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WipeResult {
    /// New total supply.
    pub total_supply: u64,
    /// Wiped serials, empty for fungible wipes.
    pub serials: Vec<i64>,
}

/// Supply after a mint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MintResult {
    /// New total supply.
    pub total_supply: u64,
    /// Minted serials, empty for fungible mints.
    pub serials: Vec<i64>,
}

/// Approved spender of an NFT.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetApprovedResult {
    /// Spender, zero when none.
    pub spender: Address,
}

/// Typed outcome of a handler's run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunResult {
    /// Status only.
    Status,
    /// Mint outcome.
    Mint(MintResult),
    /// Burn outcome.
    Burn(BurnResult),
    /// Wipe outcome.
    Wipe(WipeResult),
    /// Approval outcome.
    Approve {
        /// Whether the allowance was granted.
        approved: bool,
    },
    /// Spender query outcome.
    GetApproved(GetApprovedResult),
    /// Create outcome.
    Create(TokenCreateResult),
}

impl RunResult {
    fn total_supply(&self) -> u64 {
        match self {
            Self::Mint(r) => r.total_supply,
            Self::Burn(r) => r.total_supply,
            Self::Wipe(r) => r.total_supply,
            _ => 0,
        }
    }

    fn serials(&self) -> &[i64] {
        match self {
            Self::Mint(r) => &r.serials,
            Self::Burn(r) => &r.serials,
            Self::Wipe(r) => &r.serials,
            _ => &[],
        }
    }

    fn address(&self) -> Address {
        match self {
            Self::GetApproved(r) => r.spender,
            Self::Create(r) => r.token,
            _ => Address::ZERO,
        }
    }

    fn approved(&self) -> bool {
        !matches!(self, Self::Approve { approved: false })
    }
}

/// Output tuple a function declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// `(int64)`
    Status,
    /// `(int64,uint64,int64[])`
    Mint,
    /// `(int64,uint64)`
    Burn,
    /// `(int64,bool)`
    Approve,
    /// `(int64,address)` for spender queries.
    GetApproved,
    /// `(int64,address)` for creates.
    Create,
    /// `(bool)` for redirected ERC calls.
    ErcBool,
    /// `(address)` for redirected ERC queries.
    ErcAddress,
}

fn status() -> Token {
    Token::Int(ResponseCode::Success.code())
}

fn supply(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

/// Encodes a successful run.
#[must_use]
pub fn encode_output(kind: OutputKind, result: &RunResult) -> Bytes {
    let tokens = match kind {
        OutputKind::Status => vec![status()],
        OutputKind::Mint => vec![
            status(),
            supply(result.total_supply()),
            Token::Array(result.serials().iter().map(|s| Token::Int(*s)).collect()),
        ],
        OutputKind::Burn => vec![status(), supply(result.total_supply())],
        OutputKind::Approve => vec![status(), Token::Bool(result.approved())],
        OutputKind::GetApproved | OutputKind::Create => {
            vec![status(), Token::Address(result.address())]
        }
        OutputKind::ErcBool => vec![Token::Bool(result.approved())],
        OutputKind::ErcAddress => vec![Token::Address(result.address())],
    };
    Bytes::from(abi::encode(&tokens))
}

fn expect_success(token: Token) -> Result<(), PrecompileError> {
    let code = token.into_i64()?;
    if code == ResponseCode::Success.code() {
        Ok(())
    } else {
        Err(PrecompileError::Decode(format!("status {code} is not SUCCESS")))
    }
}

fn next(tokens: &mut std::vec::IntoIter<Token>) -> Result<Token, PrecompileError> {
    tokens
        .next()
        .ok_or_else(|| PrecompileError::Decode("missing output field".into()))
}

fn decode_serials(token: Token) -> Result<Vec<i64>, PrecompileError> {
    token.into_array()?.into_iter().map(Token::into_i64).collect()
}

/// Decodes an output produced by [`encode_output`] back into the run
/// result shape `kind` declares.
///
/// # Errors
///
/// `Decode` for malformed output or a non-success status.
pub fn decode_output(kind: OutputKind, data: &[u8]) -> Result<RunResult, PrecompileError> {
    let types = match kind {
        OutputKind::Status => vec![ParamType::Int64],
        OutputKind::Mint => vec![ParamType::Int64, ParamType::Uint, array_of(ParamType::Int64)],
        OutputKind::Burn => vec![ParamType::Int64, ParamType::Uint],
        OutputKind::Approve => vec![ParamType::Int64, ParamType::Bool],
        OutputKind::GetApproved | OutputKind::Create => vec![ParamType::Int64, ParamType::Address],
        OutputKind::ErcBool => vec![ParamType::Bool],
        OutputKind::ErcAddress => vec![ParamType::Address],
    };
    let mut tokens = abi::decode(&types, data)?.into_iter();
    if !matches!(kind, OutputKind::ErcBool | OutputKind::ErcAddress) {
        expect_success(next(&mut tokens)?)?;
    }
    Ok(match kind {
        OutputKind::Status => RunResult::Status,
        OutputKind::Mint => RunResult::Mint(MintResult {
            total_supply: next(&mut tokens)?.into_u64()?,
            serials: decode_serials(next(&mut tokens)?)?,
        }),
        OutputKind::Burn => RunResult::Burn(BurnResult {
            total_supply: next(&mut tokens)?.into_u64()?,
            serials: Vec::new(),
        }),
        OutputKind::Approve | OutputKind::ErcBool => RunResult::Approve {
            approved: matches!(next(&mut tokens)?, Token::Bool(true)),
        },
        OutputKind::GetApproved | OutputKind::ErcAddress => {
            RunResult::GetApproved(GetApprovedResult {
                spender: next(&mut tokens)?.into_address()?,
            })
        }
        OutputKind::Create => RunResult::Create(TokenCreateResult {
            token: next(&mut tokens)?.into_address()?,
        }),
    })
}

// =============================================================================
// INPUT DECODERS
// =============================================================================

fn args(
    selector: Selector,
    types: &[ParamType],
    input: &[u8],
) -> Result<std::vec::IntoIter<Token>, PrecompileError> {
    Ok(abi::decode_call(selector, types, input)?.into_iter())
}

fn addresses(token: Token) -> Result<Vec<Address>, PrecompileError> {
    token.into_array()?.into_iter().map(Token::into_address).collect()
}

/// `(address account, address token)` or `(address account, address[] tokens)`.
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_relations(
    selector: Selector,
    input: &[u8],
    multiple: bool,
) -> Result<TokenRelationsBody, PrecompileError> {
    let second = if multiple {
        array_of(ParamType::Address)
    } else {
        ParamType::Address
    };
    let mut tokens = args(selector, &[ParamType::Address, second], input)?;
    let account = next(&mut tokens)?.into_address()?;
    let tokens = if multiple {
        addresses(next(&mut tokens)?)?
    } else {
        vec![next(&mut tokens)?.into_address()?]
    };
    Ok(TokenRelationsBody { account, tokens })
}

/// `mintToken(address,uint64,bytes[])`
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_mint(selector: Selector, input: &[u8]) -> Result<TokenMintBody, PrecompileError> {
    let types = [ParamType::Address, ParamType::Uint, array_of(ParamType::Bytes)];
    let mut tokens = args(selector, &types, input)?;
    Ok(TokenMintBody {
        token: next(&mut tokens)?.into_address()?,
        amount: next(&mut tokens)?.into_u64()?,
        metadata: next(&mut tokens)?
            .into_array()?
            .into_iter()
            .map(|t| t.into_bytes().map(Bytes::from))
            .collect::<Result<_, _>>()?,
    })
}

/// `burnToken(address,uint64,int64[])`
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_burn(selector: Selector, input: &[u8]) -> Result<TokenBurnBody, PrecompileError> {
    let types = [ParamType::Address, ParamType::Uint, array_of(ParamType::Int64)];
    let mut tokens = args(selector, &types, input)?;
    Ok(TokenBurnBody {
        token: next(&mut tokens)?.into_address()?,
        amount: next(&mut tokens)?.into_u64()?,
        serials: decode_serials(next(&mut tokens)?)?,
    })
}

/// `wipeTokenAccount(address,address,uint32)`
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_wipe(selector: Selector, input: &[u8]) -> Result<TokenWipeBody, PrecompileError> {
    let types = [ParamType::Address, ParamType::Address, ParamType::Uint];
    let mut tokens = args(selector, &types, input)?;
    Ok(TokenWipeBody {
        token: next(&mut tokens)?.into_address()?,
        account: next(&mut tokens)?.into_address()?,
        amount: next(&mut tokens)?.into_u64()?,
        serials: Vec::new(),
    })
}

/// `wipeTokenAccountNFT(address,address,int64[])`
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_wipe_nft(selector: Selector, input: &[u8]) -> Result<TokenWipeBody, PrecompileError> {
    let types = [ParamType::Address, ParamType::Address, array_of(ParamType::Int64)];
    let mut tokens = args(selector, &types, input)?;
    Ok(TokenWipeBody {
        token: next(&mut tokens)?.into_address()?,
        account: next(&mut tokens)?.into_address()?,
        amount: 0,
        serials: decode_serials(next(&mut tokens)?)?,
    })
}

/// `transferToken(address,address,address,int64)` and
/// `transferNFT(address,address,address,int64)`.
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_transfer(
    selector: Selector,
    input: &[u8],
    nft: bool,
) -> Result<CryptoTransferWrapper, PrecompileError> {
    let types = [
        ParamType::Address,
        ParamType::Address,
        ParamType::Address,
        ParamType::Int64,
    ];
    let mut tokens = args(selector, &types, input)?;
    let token = next(&mut tokens)?.into_address()?;
    let from = next(&mut tokens)?.into_address()?;
    let to = next(&mut tokens)?.into_address()?;
    let value = next(&mut tokens)?.into_i64()?;
    Ok(if nft {
        CryptoTransferWrapper::nft(token, from, to, value, false)
    } else {
        CryptoTransferWrapper::fungible(token, from, to, value, false)
    })
}

/// `transferTokens(address,address[],int64[])`
///
/// # Errors
///
/// `Decode` for malformed input or mismatched list lengths.
pub fn decode_transfer_tokens(
    selector: Selector,
    input: &[u8],
) -> Result<CryptoTransferWrapper, PrecompileError> {
    let types = [
        ParamType::Address,
        array_of(ParamType::Address),
        array_of(ParamType::Int64),
    ];
    let mut tokens = args(selector, &types, input)?;
    let token = next(&mut tokens)?.into_address()?;
    let accounts = addresses(next(&mut tokens)?)?;
    let amounts = decode_serials(next(&mut tokens)?)?;
    if accounts.len() != amounts.len() {
        return Err(PrecompileError::Decode(format!(
            "{} accounts but {} amounts",
            accounts.len(),
            amounts.len()
        )));
    }
    Ok(CryptoTransferWrapper {
        hbar_transfers: Vec::new(),
        token_transfers: vec![TokenTransferList {
            token,
            transfers: accounts
                .into_iter()
                .zip(amounts)
                .map(|(account, amount)| AccountAmount {
                    account,
                    amount,
                    is_approval: false,
                })
                .collect(),
            nft_transfers: Vec::new(),
        }],
    })
}

/// ERC `transfer(address,uint256)` or `transferFrom(address,address,uint256)`
/// on a token address. The caller spends on the owner's behalf for
/// `transferFrom`.
///
/// # Errors
///
/// `Decode` for malformed input or a value wider than `int64`.
pub fn decode_erc_transfer(
    input: &[u8],
    params: &ErcTransferParams,
    transfer_from: bool,
) -> Result<CryptoTransferWrapper, PrecompileError> {
    let (from, to, value) = if transfer_from {
        let types = [ParamType::Address, ParamType::Address, ParamType::Uint];
        let mut tokens = args(params.function_id, &types, input)?;
        (
            next(&mut tokens)?.into_address()?,
            next(&mut tokens)?.into_address()?,
            next(&mut tokens)?.into_serial()?,
        )
    } else {
        let types = [ParamType::Address, ParamType::Uint];
        let mut tokens = args(params.function_id, &types, input)?;
        (
            params.sender,
            next(&mut tokens)?.into_address()?,
            next(&mut tokens)?.into_serial()?,
        )
    };
    let is_approval = transfer_from && from != params.sender;
    Ok(if params.is_nft {
        CryptoTransferWrapper::nft(params.token, from, to, value, is_approval)
    } else {
        CryptoTransferWrapper::fungible(params.token, from, to, value, is_approval)
    })
}

/// `approve(address,address,uint256)` / `approveNFT(address,address,uint256)`,
/// or the redirected `approve(address,uint256)` when `params.token` is the
/// called token.
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_approve(
    selector: Selector,
    input: &[u8],
    params: &ApproveParams,
    redirected: bool,
) -> Result<ApproveAllowanceBody, PrecompileError> {
    let mut tokens = if redirected {
        args(selector, &[ParamType::Address, ParamType::Uint], input)?
    } else {
        args(
            selector,
            &[ParamType::Address, ParamType::Address, ParamType::Uint],
            input,
        )?
    };
    let token = if redirected {
        params.token
    } else {
        next(&mut tokens)?.into_address()?
    };
    let spender = next(&mut tokens)?.into_address()?;
    let value = next(&mut tokens)?;
    let mut body = ApproveAllowanceBody::default();
    if params.is_fungible {
        body.token_allowances.push(TokenAllowance {
            token,
            owner: params.owner,
            spender,
            amount: value.into_u64()?,
        });
    } else {
        body.nft_allowances.push(NftAllowance {
            token,
            owner: params.owner,
            spender,
            serials: vec![value.into_serial()?],
        });
    }
    Ok(body)
}

/// `getApproved(address,uint256)`, or the redirected `getApproved(uint256)`
/// when `token` is given.
///
/// # Errors
///
/// `Decode` for malformed input.
pub fn decode_get_approved(
    selector: Selector,
    input: &[u8],
    token: Option<Address>,
) -> Result<ApproveDecodedNftInfo, PrecompileError> {
    match token {
        Some(token) => {
            let mut tokens = args(selector, &[ParamType::Uint], input)?;
            Ok(ApproveDecodedNftInfo {
                token,
                serial: next(&mut tokens)?.into_uint()?,
            })
        }
        None => {
            let mut tokens = args(selector, &[ParamType::Address, ParamType::Uint], input)?;
            Ok(ApproveDecodedNftInfo {
                token: next(&mut tokens)?.into_address()?,
                serial: next(&mut tokens)?.into_uint()?,
            })
        }
    }
}

/// `createFungibleToken(string,string,address,uint64,uint32)`
///
/// # Errors
///
/// `Decode` for malformed input or decimals wider than 32 bits.
pub fn decode_create_fungible(
    selector: Selector,
    input: &[u8],
) -> Result<TokenCreateBody, PrecompileError> {
    let types = [
        ParamType::String,
        ParamType::String,
        ParamType::Address,
        ParamType::Uint,
        ParamType::Uint,
    ];
    let mut tokens = args(selector, &types, input)?;
    let name = next(&mut tokens)?.into_string()?;
    let symbol = next(&mut tokens)?.into_string()?;
    let treasury = next(&mut tokens)?.into_address()?;
    let initial_supply = next(&mut tokens)?.into_u64()?;
    let decimals = u32::try_from(next(&mut tokens)?.into_u64()?)
        .map_err(|_| PrecompileError::Decode("decimals exceed uint32".into()))?;
    Ok(TokenCreateBody {
        name,
        symbol,
        treasury,
        initial_supply,
        decimals,
        token_type: TokenType::FungibleCommon,
        supply_key: true,
    })
}

// =============================================================================
// TESTS
// =============================================================================
