//! # Synthetic Transactions
//!
//! Precompiles translate ABI calls into the ledger transaction they would
//! have produced on a consensus node. The fee machinery prices those bodies
//! exactly as it would price a submitted transaction.

use crate::domain::value_objects::{Address, Bytes, Timestamp};
use crate::domain::entities::TokenType;
use crate::errors::PricingError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// FUNCTIONALITY
// =============================================================================

/// Ledger operation kind, used to key fee schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Functionality {
    None,
    ContractCall,
    ContractCreate,
    ContractUpdate,
    ContractDelete,
    EthereumTransaction,
    CryptoApproveAllowance,
    CryptoDeleteAllowance,
    CryptoCreate,
    CryptoDelete,
    CryptoTransfer,
    CryptoUpdate,
    Freeze,
    TokenCreate,
    TokenFreezeAccount,
    TokenUnfreezeAccount,
    TokenGrantKycToAccount,
    TokenRevokeKycFromAccount,
    TokenDelete,
    TokenUpdate,
    TokenMint,
    TokenBurn,
    TokenAccountWipe,
    TokenAssociateToAccount,
    TokenDissociateFromAccount,
    TokenPause,
    TokenUnpause,
    TokenGetInfo,
}

impl fmt::Display for Functionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// BODY PAYLOADS
// =============================================================================

/// Account or contract call payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallBody {
    /// Called contract.
    pub contract: Address,
    /// Gas offered.
    pub gas: u64,
    /// Tinybars sent.
    pub amount: i64,
    /// Call data.
    pub function_parameters: Bytes,
}

/// Associate or dissociate payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelationsBody {
    /// Account being (dis)associated.
    pub account: Address,
    /// Tokens.
    pub tokens: Vec<Address>,
}

/// Mint payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMintBody {
    /// Token.
    pub token: Address,
    /// Fungible amount.
    pub amount: u64,
    /// One metadata entry per NFT to mint.
    pub metadata: Vec<Bytes>,
}

/// Burn payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBurnBody {
    /// Token.
    pub token: Address,
    /// Fungible amount.
    pub amount: u64,
    /// NFT serials.
    pub serials: Vec<i64>,
}

/// Wipe payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWipeBody {
    /// Token.
    pub token: Address,
    /// Account being wiped.
    pub account: Address,
    /// Fungible amount.
    pub amount: u64,
    /// NFT serials.
    pub serials: Vec<i64>,
}

/// Token deletion payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeleteBody {
    /// Token.
    pub token: Address,
}

/// Token creation payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateBody {
    /// Name.
    pub name: String,
    /// Symbol.
    pub symbol: String,
    /// Treasury account.
    pub treasury: Address,
    /// Initial supply minted to the treasury.
    pub initial_supply: u64,
    /// Decimals.
    pub decimals: u32,
    /// Supply model.
    pub token_type: TokenType,
    /// Whether the creating contract holds the supply key.
    pub supply_key: bool,
}

/// A signed fungible amount. Negative debits, positive credits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAmount {
    /// Account.
    pub account: Address,
    /// Signed amount.
    pub amount: i64,
    /// Debit is paid from an allowance.
    pub is_approval: bool,
}

/// A single NFT movement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTransfer {
    /// Current owner.
    pub sender: Address,
    /// New owner.
    pub receiver: Address,
    /// Serial.
    pub serial: i64,
    /// Move is paid from an allowance.
    pub is_approval: bool,
}

/// All movements for one token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferList {
    /// Token.
    pub token: Address,
    /// Fungible movements.
    pub transfers: Vec<AccountAmount>,
    /// NFT movements.
    pub nft_transfers: Vec<NftTransfer>,
}

/// Transfer payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoTransferBody {
    /// Hbar movements.
    pub hbar_transfers: Vec<AccountAmount>,
    /// Token movements.
    pub token_transfers: Vec<TokenTransferList>,
}

/// Fungible allowance grant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowance {
    /// Token.
    pub token: Address,
    /// Owner.
    pub owner: Address,
    /// Spender.
    pub spender: Address,
    /// Amount.
    pub amount: u64,
}

/// NFT allowance grant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAllowance {
    /// Token.
    pub token: Address,
    /// Owner.
    pub owner: Address,
    /// Spender; zero clears the approval.
    pub spender: Address,
    /// Serials covered.
    pub serials: Vec<i64>,
}

/// Allowance payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveAllowanceBody {
    /// Fungible grants.
    pub token_allowances: Vec<TokenAllowance>,
    /// NFT grants.
    pub nft_allowances: Vec<NftAllowance>,
}

// =============================================================================
// TRANSACTION BODY
// =============================================================================

/// Ledger transaction body. Kinds the simulator never builds carry no
/// payload; they exist so that fee functions can still be keyed on them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TransactionBody {
    ContractCall(ContractCallBody),
    ContractCreate,
    ContractUpdate,
    ContractDelete,
    EthereumTransaction,
    CryptoApproveAllowance(ApproveAllowanceBody),
    CryptoDeleteAllowance,
    CryptoCreate,
    CryptoDelete,
    CryptoTransfer(CryptoTransferBody),
    CryptoUpdate,
    Freeze,
    TokenCreate(TokenCreateBody),
    TokenFreezeAccount,
    TokenUnfreezeAccount,
    TokenGrantKycToAccount,
    TokenRevokeKycFromAccount,
    TokenDelete(TokenDeleteBody),
    TokenUpdate,
    TokenMint(TokenMintBody),
    TokenBurn(TokenBurnBody),
    TokenAccountWipe(TokenWipeBody),
    TokenAssociateToAccount(TokenRelationsBody),
    TokenDissociateFromAccount(TokenRelationsBody),
    TokenPause,
    TokenUnpause,
    /// A kind this engine has no fee function for, e.g. schedule signing.
    Unrecognized(String),
}

/// Maps a body to its fee functionality.
///
/// # Errors
///
/// `PricingError::UnknownFunction` for unrecognized kinds.
pub fn function_of(body: &TransactionBody) -> Result<Functionality, PricingError> {
    use TransactionBody as B;
    let function = match body {
        B::ContractCall(_) => Functionality::ContractCall,
        B::ContractCreate => Functionality::ContractCreate,
        B::ContractUpdate => Functionality::ContractUpdate,
        B::ContractDelete => Functionality::ContractDelete,
        B::EthereumTransaction => Functionality::EthereumTransaction,
        B::CryptoApproveAllowance(_) => Functionality::CryptoApproveAllowance,
        B::CryptoDeleteAllowance => Functionality::CryptoDeleteAllowance,
        B::CryptoCreate => Functionality::CryptoCreate,
        B::CryptoDelete => Functionality::CryptoDelete,
        B::CryptoTransfer(_) => Functionality::CryptoTransfer,
        B::CryptoUpdate => Functionality::CryptoUpdate,
        B::Freeze => Functionality::Freeze,
        B::TokenCreate(_) => Functionality::TokenCreate,
        B::TokenFreezeAccount => Functionality::TokenFreezeAccount,
        B::TokenUnfreezeAccount => Functionality::TokenUnfreezeAccount,
        B::TokenGrantKycToAccount => Functionality::TokenGrantKycToAccount,
        B::TokenRevokeKycFromAccount => Functionality::TokenRevokeKycFromAccount,
        B::TokenDelete(_) => Functionality::TokenDelete,
        B::TokenUpdate => Functionality::TokenUpdate,
        B::TokenMint(_) => Functionality::TokenMint,
        B::TokenBurn(_) => Functionality::TokenBurn,
        B::TokenAccountWipe(_) => Functionality::TokenAccountWipe,
        B::TokenAssociateToAccount(_) => Functionality::TokenAssociateToAccount,
        B::TokenDissociateFromAccount(_) => Functionality::TokenDissociateFromAccount,
        B::TokenPause => Functionality::TokenPause,
        B::TokenUnpause => Functionality::TokenUnpause,
        B::Unrecognized(kind) => return Err(PricingError::UnknownFunction(kind.clone())),
    };
    Ok(function)
}

/// Like [`function_of`], but unknown kinds map to [`Functionality::None`].
#[must_use]
pub fn function_of_or_none(body: &TransactionBody) -> Functionality {
    function_of(body).unwrap_or(Functionality::None)
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A synthetic transaction: common header plus body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Paying account.
    pub payer: Address,
    /// Valid-start time of the transaction id.
    pub valid_start: Timestamp,
    /// Memo.
    pub memo: String,
    /// Body.
    pub body: TransactionBody,
}

impl Transaction {
    /// Wraps a body with an empty memo.
    #[must_use]
    pub fn new(payer: Address, valid_start: Timestamp, body: TransactionBody) -> Self {
        Self {
            payer,
            valid_start,
            memo: String::new(),
            body,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_of_token_bodies() {
        let body = TransactionBody::TokenAssociateToAccount(TokenRelationsBody::default());
        assert_eq!(
            function_of(&body).unwrap(),
            Functionality::TokenAssociateToAccount
        );
        let body = TransactionBody::TokenAccountWipe(TokenWipeBody::default());
        assert_eq!(function_of(&body).unwrap(), Functionality::TokenAccountWipe);
        assert_eq!(
            function_of(&TransactionBody::TokenPause).unwrap(),
            Functionality::TokenPause
        );
    }

    #[test]
    fn test_function_of_unknown_kind_is_error() {
        let body = TransactionBody::Unrecognized("ScheduleSign".into());
        assert!(matches!(
            function_of(&body),
            Err(PricingError::UnknownFunction(kind)) if kind == "ScheduleSign"
        ));
        assert_eq!(function_of_or_none(&body), Functionality::None);
    }
}
