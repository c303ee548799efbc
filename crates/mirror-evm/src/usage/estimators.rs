//! # Per-Transaction Usage Estimators
//!
//! Estimators turn one transaction body into a [`FeeData`] usage vector:
//! the same shape as a fee schedule entry, but holding resource quantities
//! instead of prices. The fee calculator multiplies the two.

use super::accumulator::{non_degenerate_div, sizes, SigUsage};
use crate::domain::transactions::{Transaction, TransactionBody};
use crate::errors::PricingError;
use crate::pricing::{FeeComponents, FeeData};
use crate::state::WorldView;

// =============================================================================
// ESTIMATOR UTILS
// =============================================================================

/// Shared base-usage rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct EstimatorUtils;

impl EstimatorUtils {
    /// Bytes every transaction pays for: body header, memo and signatures.
    #[must_use]
    pub fn base_bpt(&self, txn: &Transaction, sig_usage: &SigUsage) -> i64 {
        let memo = i64::try_from(txn.memo.len()).unwrap_or(i64::MAX);
        sizes::BASIC_TX_BODY_SIZE
            .saturating_add(memo)
            .saturating_add(i64::from(sig_usage.sigs_size))
    }

    /// Receipt RAM byte-seconds every transaction pays for.
    #[must_use]
    pub fn base_network_rbs(&self) -> i64 {
        sizes::BASIC_RECEIPT_SIZE * sizes::RECEIPT_STORAGE_TIME_SEC
    }

    /// Seconds from the transaction's valid-start until `expiry`, never
    /// negative.
    #[must_use]
    pub fn relative_lifetime(&self, txn: &Transaction, expiry: i64) -> i64 {
        expiry.saturating_sub(txn.valid_start.seconds()).max(0)
    }
}

// =============================================================================
// TXN USAGE ESTIMATOR
// =============================================================================

/// Builder for one usage vector.
#[derive(Clone, Debug)]
pub struct TxnUsageEstimator {
    sig_usage: SigUsage,
    bpt: i64,
    vpt: i64,
    rbs: i64,
    sbs: i64,
    network_rbs: i64,
}

impl TxnUsageEstimator {
    /// Starts from the base usage of `txn`.
    #[must_use]
    pub fn new(sig_usage: SigUsage, txn: &Transaction, utils: &EstimatorUtils) -> Self {
        Self {
            sig_usage,
            bpt: utils.base_bpt(txn, &sig_usage),
            vpt: i64::from(sig_usage.num_sigs),
            rbs: 0,
            sbs: 0,
            network_rbs: utils.base_network_rbs(),
        }
    }

    /// Adds transaction bytes.
    pub fn add_bpt(&mut self, bpt: i64) -> &mut Self {
        self.bpt = self.bpt.saturating_add(bpt);
        self
    }

    /// Adds service RAM byte-seconds.
    pub fn add_rbs(&mut self, rbs: i64) -> &mut Self {
        self.rbs = self.rbs.saturating_add(rbs);
        self
    }

    /// Adds service storage byte-seconds.
    pub fn add_sbs(&mut self, sbs: i64) -> &mut Self {
        self.sbs = self.sbs.saturating_add(sbs);
        self
    }

    /// Adds network RAM byte-seconds.
    pub fn add_network_rbs(&mut self, rbs: i64) -> &mut Self {
        self.network_rbs = self.network_rbs.saturating_add(rbs);
        self
    }

    /// Finishes the vector.
    #[must_use]
    pub fn get(&self) -> FeeData {
        let node = FeeComponents {
            constant: 1,
            bpt: self.bpt,
            vpt: i64::from(self.sig_usage.num_payer_keys),
            bpr: sizes::INT_SIZE,
            ..FeeComponents::default()
        };
        let network = FeeComponents {
            constant: 1,
            bpt: self.bpt,
            vpt: self.vpt,
            rbh: non_degenerate_div(self.network_rbs, sizes::HRS_DIVISOR),
            ..FeeComponents::default()
        };
        let service = FeeComponents {
            constant: 1,
            rbh: non_degenerate_div(self.rbs, sizes::HRS_DIVISOR),
            sbh: non_degenerate_div(self.sbs, sizes::HRS_DIVISOR),
            ..FeeComponents::default()
        };
        FeeData {
            node,
            network,
            service,
            ..FeeData::default()
        }
    }
}

/// Creates estimators.
pub trait EstimatorFactory: Send + Sync {
    /// Estimator seeded with the base usage of `txn`.
    fn get(&self, sig_usage: SigUsage, txn: &Transaction, utils: &EstimatorUtils)
        -> TxnUsageEstimator;
}

/// Plain [`TxnUsageEstimator::new`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEstimatorFactory;

impl EstimatorFactory for DefaultEstimatorFactory {
    fn get(
        &self,
        sig_usage: SigUsage,
        txn: &Transaction,
        utils: &EstimatorUtils,
    ) -> TxnUsageEstimator {
        TxnUsageEstimator::new(sig_usage, txn, utils)
    }
}

// =============================================================================
// RESOURCE USAGE ESTIMATORS
// =============================================================================

/// Usage of one transaction kind.
pub trait TxnResourceUsageEstimator: Send + Sync {
    /// True when this estimator handles the body.
    fn applicable_to(&self, body: &TransactionBody) -> bool;

    /// Usage vector for `txn`.
    ///
    /// # Errors
    ///
    /// `PricingError` when the body is not one this estimator handles, or
    /// a state lookup fails.
    fn usage_given(
        &self,
        txn: &Transaction,
        sig_usage: SigUsage,
        view: &dyn WorldView,
    ) -> Result<FeeData, PricingError>;
}

fn wrong_body(txn: &Transaction) -> PricingError {
    PricingError::UnknownFunction(format!("{:?}", crate::domain::function_of_or_none(&txn.body)))
}

/// Associating tokens with an account.
///
/// Each new relationship is held in state until the account expires.
pub struct TokenAssociateResourceUsage {
    factory: Box<dyn EstimatorFactory>,
    utils: EstimatorUtils,
}

impl TokenAssociateResourceUsage {
    /// Creates the estimator.
    #[must_use]
    pub fn new(factory: Box<dyn EstimatorFactory>) -> Self {
        Self {
            factory,
            utils: EstimatorUtils,
        }
    }
}

impl TxnResourceUsageEstimator for TokenAssociateResourceUsage {
    fn applicable_to(&self, body: &TransactionBody) -> bool {
        matches!(body, TransactionBody::TokenAssociateToAccount(_))
    }

    fn usage_given(
        &self,
        txn: &Transaction,
        sig_usage: SigUsage,
        view: &dyn WorldView,
    ) -> Result<FeeData, PricingError> {
        let TransactionBody::TokenAssociateToAccount(op) = &txn.body else {
            return Err(wrong_body(txn));
        };
        let Some(account) = view.account_entry(&op.account)? else {
            return Ok(FeeData::default());
        };

        let num_tokens = i64::try_from(op.tokens.len()).unwrap_or(i64::MAX);
        let lifetime = self.utils.relative_lifetime(txn, account.expiry);
        let mut estimate = self.factory.get(sig_usage, txn, &self.utils);
        estimate
            .add_bpt(sizes::BASIC_ENTITY_ID_SIZE.saturating_mul(num_tokens.saturating_add(1)))
            .add_rbs(
                sizes::TOKEN_REL_BYTES
                    .saturating_mul(num_tokens)
                    .saturating_mul(lifetime),
            );
        Ok(estimate.get())
    }
}

/// Deleting a token.
pub struct TokenDeleteResourceUsage {
    factory: Box<dyn EstimatorFactory>,
    utils: EstimatorUtils,
}

impl TokenDeleteResourceUsage {
    /// Creates the estimator.
    #[must_use]
    pub fn new(factory: Box<dyn EstimatorFactory>) -> Self {
        Self {
            factory,
            utils: EstimatorUtils,
        }
    }
}

impl TxnResourceUsageEstimator for TokenDeleteResourceUsage {
    fn applicable_to(&self, body: &TransactionBody) -> bool {
        matches!(body, TransactionBody::TokenDelete(_))
    }

    fn usage_given(
        &self,
        txn: &Transaction,
        sig_usage: SigUsage,
        _view: &dyn WorldView,
    ) -> Result<FeeData, PricingError> {
        if !self.applicable_to(&txn.body) {
            return Err(wrong_body(txn));
        }
        let mut estimate = self.factory.get(sig_usage, txn, &self.utils);
        estimate.add_bpt(sizes::BASIC_ENTITY_ID_SIZE);
        Ok(estimate.get())
    }
}

/// Base usage only; used for kinds with no dedicated estimator.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseResourceUsage;

impl TxnResourceUsageEstimator for BaseResourceUsage {
    fn applicable_to(&self, _body: &TransactionBody) -> bool {
        true
    }

    fn usage_given(
        &self,
        txn: &Transaction,
        sig_usage: SigUsage,
        _view: &dyn WorldView,
    ) -> Result<FeeData, PricingError> {
        Ok(TxnUsageEstimator::new(sig_usage, txn, &EstimatorUtils).get())
    }
}

// =============================================================================
// TESTS
// =============================================================================
