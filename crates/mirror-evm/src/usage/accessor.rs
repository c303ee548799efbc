//! # Transaction Accessor
//!
//! Read-only view over a synthetic transaction that the usage estimators
//! price. The simulator never sees real signatures, so signature usage is a
//! fixed single-signer profile unless the caller supplies one.

use super::accumulator::{BaseTransactionMeta, SigUsage};
use crate::domain::transactions::{function_of, Functionality, Transaction, TransactionBody};
use crate::domain::value_objects::{Address, Timestamp};
use crate::errors::PricingError;
use crate::pricing::SubType;

/// Ed25519 signature plus public key prefix.
pub const DEFAULT_SIG_PAIR_SIZE: i32 = 64 + 32;

/// What the estimators need to know about a transaction.
pub trait TxnAccessor: Send + Sync {
    /// Fee function of the body.
    fn function(&self) -> Functionality;

    /// Fee sub-type of the body.
    fn sub_type(&self) -> SubType;

    /// The transaction itself.
    fn txn(&self) -> &Transaction;

    /// Paying account.
    fn payer(&self) -> Address {
        self.txn().payer
    }

    /// Valid-start of the transaction id.
    fn valid_start(&self) -> Timestamp {
        self.txn().valid_start
    }

    /// Signature usage assuming the payer has `num_payer_keys` keys.
    fn usage_given(&self, num_payer_keys: i32) -> SigUsage;

    /// Body-independent usage facts.
    fn base_usage_meta(&self) -> BaseTransactionMeta;
}

/// Accessor over an unsigned synthetic transaction.
#[derive(Clone, Debug)]
pub struct SignedTxnAccessor {
    txn: Transaction,
    function: Functionality,
    num_sigs: i32,
}

impl SignedTxnAccessor {
    /// Wraps a transaction signed by a single key.
    ///
    /// # Errors
    ///
    /// `PricingError::UnknownFunction` when the body has no fee function.
    pub fn new(txn: Transaction) -> Result<Self, PricingError> {
        let function = function_of(&txn.body)?;
        Ok(Self {
            txn,
            function,
            num_sigs: 1,
        })
    }

    /// Overrides the number of signatures on the transaction.
    #[must_use]
    pub fn with_num_sigs(mut self, num_sigs: i32) -> Self {
        self.num_sigs = num_sigs.max(0);
        self
    }
}

impl TxnAccessor for SignedTxnAccessor {
    fn function(&self) -> Functionality {
        self.function
    }

    fn sub_type(&self) -> SubType {
        sub_type_of(&self.txn.body)
    }

    fn txn(&self) -> &Transaction {
        &self.txn
    }

    fn usage_given(&self, num_payer_keys: i32) -> SigUsage {
        SigUsage::new(
            self.num_sigs,
            self.num_sigs.saturating_mul(DEFAULT_SIG_PAIR_SIZE),
            num_payer_keys,
        )
    }

    fn base_usage_meta(&self) -> BaseTransactionMeta {
        let num_explicit_transfers = match &self.txn.body {
            TransactionBody::CryptoTransfer(body) => {
                i32::try_from(body.hbar_transfers.len()).unwrap_or(i32::MAX)
            }
            _ => 0,
        };
        BaseTransactionMeta {
            memo_utf8_bytes: i32::try_from(self.txn.memo.len()).unwrap_or(i32::MAX),
            num_explicit_transfers,
        }
    }
}

/// Token operations on unique tokens are priced under their own sub-type.
#[must_use]
pub fn sub_type_of(body: &TransactionBody) -> SubType {
    match body {
        TransactionBody::TokenMint(op) if !op.metadata.is_empty() => {
            SubType::TokenNonFungibleUnique
        }
        TransactionBody::TokenBurn(op) if !op.serials.is_empty() => {
            SubType::TokenNonFungibleUnique
        }
        TransactionBody::TokenAccountWipe(op) if !op.serials.is_empty() => {
            SubType::TokenNonFungibleUnique
        }
        TransactionBody::TokenCreate(op) => match op.token_type {
            crate::domain::entities::TokenType::FungibleCommon => SubType::TokenFungibleCommon,
            crate::domain::entities::TokenType::NonFungibleUnique => {
                SubType::TokenNonFungibleUnique
            }
        },
        _ => SubType::Default,
    }
}
