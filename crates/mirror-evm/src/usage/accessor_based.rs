//! # Accessor-Based Usages
//!
//! Assesses the resource usage of the transaction kinds the precompiles
//! synthesize, writing into a caller-owned [`UsageAccumulator`].

use super::accessor::TxnAccessor;
use super::accumulator::{sizes, SigUsage, UsageAccumulator, UsageProperties};
use crate::domain::transactions::{Functionality, TransactionBody};
use crate::errors::PricingError;

/// Default auto-renew period assumed for entities created by a call.
pub const THREE_MONTHS_IN_SECONDS: i64 = 7_776_000;

/// Token entity bytes before name and symbol.
const TOKEN_ENTITY_SIZES: i64 = 3 * sizes::BASIC_ENTITY_ID_SIZE + 3 * sizes::LONG_SIZE + sizes::INT_SIZE;

const SUPPORTED: [Functionality; 11] = [
    Functionality::CryptoTransfer,
    Functionality::CryptoApproveAllowance,
    Functionality::TokenMint,
    Functionality::TokenBurn,
    Functionality::TokenAccountWipe,
    Functionality::TokenPause,
    Functionality::TokenUnpause,
    Functionality::TokenFreezeAccount,
    Functionality::TokenUnfreezeAccount,
    Functionality::TokenCreate,
    Functionality::TokenDissociateFromAccount,
];

/// Usage assessor keyed on [`Functionality`].
pub struct AccessorBasedUsages {
    properties: Box<dyn UsageProperties>,
}

impl AccessorBasedUsages {
    /// Creates an assessor.
    #[must_use]
    pub fn new(properties: Box<dyn UsageProperties>) -> Self {
        Self { properties }
    }

    /// True when `function` can be assessed here.
    #[must_use]
    pub fn supports(&self, function: Functionality) -> bool {
        SUPPORTED.contains(&function)
    }

    /// Resets `accumulator` and adds the usage of the accessor's body.
    ///
    /// # Errors
    ///
    /// `PricingError::UnknownFunction` when the function is not supported.
    pub fn assess(
        &self,
        sig_usage: &SigUsage,
        accessor: &dyn TxnAccessor,
        accumulator: &mut UsageAccumulator,
    ) -> Result<(), PricingError> {
        let function = accessor.function();
        if !self.supports(function) {
            return Err(PricingError::UnknownFunction(function.to_string()));
        }

        accumulator.reset_for_transaction(&accessor.base_usage_meta(), sig_usage);
        let entity = sizes::BASIC_ENTITY_ID_SIZE;

        match &accessor.txn().body {
            TransactionBody::CryptoTransfer(op) => {
                let amount_bytes = i64::from(self.properties.account_amount_bytes());
                let nft_bytes = i64::from(self.properties.nft_transfer_bytes());
                let mut fungible = 0i64;
                let mut unique = 0i64;
                for list in &op.token_transfers {
                    fungible += len(&list.transfers);
                    unique += len(&list.nft_transfers);
                }
                accumulator.add_bpt(
                    entity * len(&op.token_transfers) + amount_bytes * fungible + nft_bytes * unique,
                );
                accumulator.add_rbs(
                    sizes::BASIC_ACCOUNT_AMT_SIZE * len(&op.hbar_transfers)
                        * self.properties.legacy_receipt_storage_secs(),
                );
                accumulator.add_nft_transfers(unique);
            }
            TransactionBody::CryptoApproveAllowance(op) => {
                let fungible_bytes = len(&op.token_allowances) * (3 * entity + sizes::LONG_SIZE);
                let serials: i64 = op.nft_allowances.iter().map(|a| len(&a.serials)).sum();
                let nft_bytes = len(&op.nft_allowances) * 3 * entity + serials * sizes::LONG_SIZE;
                accumulator.add_bpt(fungible_bytes + nft_bytes);
                accumulator.add_rbs((fungible_bytes + nft_bytes) * THREE_MONTHS_IN_SECONDS);
            }
            TransactionBody::TokenMint(op) => {
                if op.metadata.is_empty() {
                    accumulator.add_bpt(entity + sizes::LONG_SIZE);
                    accumulator
                        .add_network_rbs(sizes::LONG_SIZE * sizes::RECEIPT_STORAGE_TIME_SEC);
                } else {
                    let metadata: i64 = op.metadata.iter().map(|m| len(m.as_slice())).sum();
                    let count = len(&op.metadata);
                    accumulator.add_bpt(entity + metadata);
                    accumulator.add_rbs((sizes::NFT_BYTES * count + metadata) * THREE_MONTHS_IN_SECONDS);
                    accumulator.add_network_rbs(
                        count * sizes::LONG_SIZE * sizes::RECEIPT_STORAGE_TIME_SEC,
                    );
                }
            }
            TransactionBody::TokenBurn(op) => {
                accumulator.add_bpt(entity + serial_or_amount_bytes(&op.serials));
                accumulator.add_network_rbs(sizes::LONG_SIZE * sizes::RECEIPT_STORAGE_TIME_SEC);
            }
            TransactionBody::TokenAccountWipe(op) => {
                accumulator.add_bpt(2 * entity + serial_or_amount_bytes(&op.serials));
                accumulator.add_network_rbs(sizes::LONG_SIZE * sizes::RECEIPT_STORAGE_TIME_SEC);
            }
            TransactionBody::TokenPause | TransactionBody::TokenUnpause => {
                accumulator.add_bpt(entity);
            }
            TransactionBody::TokenFreezeAccount | TransactionBody::TokenUnfreezeAccount => {
                accumulator.add_bpt(2 * entity);
            }
            TransactionBody::TokenCreate(op) => {
                let text = len(op.name.as_bytes()) + len(op.symbol.as_bytes());
                let bytes = TOKEN_ENTITY_SIZES + text;
                accumulator.add_bpt(bytes);
                accumulator.add_rbs(
                    (bytes + sizes::TOKEN_REL_BYTES) * THREE_MONTHS_IN_SECONDS,
                );
                accumulator.add_network_rbs(entity * sizes::RECEIPT_STORAGE_TIME_SEC);
            }
            TransactionBody::TokenDissociateFromAccount(op) => {
                accumulator.add_bpt(entity * (1 + len(&op.tokens)));
            }
            _ => return Err(PricingError::UnknownFunction(function.to_string())),
        }
        Ok(())
    }
}

fn len<T>(items: &[T]) -> i64 {
    i64::try_from(items.len()).unwrap_or(i64::MAX)
}

fn serial_or_amount_bytes(serials: &[i64]) -> i64 {
    if serials.is_empty() {
        sizes::LONG_SIZE
    } else {
        len(serials) * sizes::LONG_SIZE
    }
}
