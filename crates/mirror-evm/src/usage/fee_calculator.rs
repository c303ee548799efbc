//! # Usage-Based Fee Calculator
//!
//! Entry point for pricing a synthetic transaction. Accessor-priced
//! functions go through [`PricedUsageCalculator`]; everything else through
//! a per-kind resource estimator.

use super::accessor::TxnAccessor;
use super::accessor_based::AccessorBasedUsages;
use super::accumulator::{DefaultUsageProperties, UsageAccumulator};
use super::estimators::{
    BaseResourceUsage, DefaultEstimatorFactory, TokenAssociateResourceUsage,
    TokenDeleteResourceUsage, TxnResourceUsageEstimator,
};
use super::priced::PricedUsageCalculator;
use crate::domain::value_objects::Timestamp;
use crate::errors::PricingError;
use crate::ports::outbound::{HbarCentExchange, UsagePricesProvider};
use crate::pricing::{FeeObject, OverflowCheckingCalc};
use crate::state::WorldView;
use std::sync::Arc;
use tracing::debug;

/// Fee calculator over every supported transaction kind.
pub struct UsageBasedFeeCalculator {
    usage_prices: Arc<dyn UsagePricesProvider>,
    exchange: Arc<dyn HbarCentExchange>,
    priced: PricedUsageCalculator,
    estimators: Vec<Box<dyn TxnResourceUsageEstimator>>,
    calculator: OverflowCheckingCalc,
}

impl UsageBasedFeeCalculator {
    /// Creates a calculator.
    ///
    /// # Arguments
    ///
    /// * `usage_prices` - Fee schedule lookup
    /// * `exchange` - Exchange rate lookup
    /// * `priced` - Accessor-based pricing
    /// * `estimators` - Estimators for the remaining kinds, first match wins
    pub fn new(
        usage_prices: Arc<dyn UsagePricesProvider>,
        exchange: Arc<dyn HbarCentExchange>,
        priced: PricedUsageCalculator,
        estimators: Vec<Box<dyn TxnResourceUsageEstimator>>,
    ) -> Self {
        Self {
            usage_prices,
            exchange,
            priced,
            estimators,
            calculator: OverflowCheckingCalc::new(),
        }
    }

    /// Calculator with the protocol usage properties and the associate and
    /// delete estimators.
    pub fn with_default_estimators(
        usage_prices: Arc<dyn UsagePricesProvider>,
        exchange: Arc<dyn HbarCentExchange>,
    ) -> Self {
        let priced = PricedUsageCalculator::new(
            AccessorBasedUsages::new(Box::new(DefaultUsageProperties)),
            OverflowCheckingCalc::new(),
        );
        Self::new(
            usage_prices,
            exchange,
            priced,
            vec![
                Box::new(TokenAssociateResourceUsage::new(Box::new(DefaultEstimatorFactory))),
                Box::new(TokenDeleteResourceUsage::new(Box::new(DefaultEstimatorFactory))),
            ],
        )
    }

    /// Fees for the accessor's transaction at `at`.
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate, an invalid rate, or a failed
    /// state lookup.
    pub fn compute_fee(
        &self,
        accessor: &dyn TxnAccessor,
        num_payer_keys: i32,
        view: &dyn WorldView,
        at: Timestamp,
    ) -> Result<FeeObject, PricingError> {
        let function = accessor.function();
        let mut schedule = self.usage_prices.prices_given(function, at)?;
        let prices = schedule
            .remove(&accessor.sub_type())
            .or_else(|| schedule.remove(&crate::pricing::SubType::Default))
            .ok_or_else(|| PricingError::MissingFeeSchedule {
                function: function.to_string(),
                seconds: at.seconds(),
            })?;
        let rate = self.exchange.rate(at)?;
        rate.validate()?;

        let fees = if self.priced.supports(function) {
            let mut accumulator = UsageAccumulator::new();
            self.priced
                .in_handle_fees(accessor, &prices, &rate, num_payer_keys, &mut accumulator)?
        } else {
            let sig_usage = accessor.usage_given(num_payer_keys);
            let txn = accessor.txn();
            let usage = match self.estimators.iter().find(|e| e.applicable_to(&txn.body)) {
                Some(estimator) => estimator.usage_given(txn, sig_usage, view)?,
                None => BaseResourceUsage.usage_given(txn, sig_usage, view)?,
            };
            self.calculator.fees_from_usage(&prices, &usage, &rate, 1)
        };
        debug!(%function, total = fees.total(), "computed fee");
        Ok(fees)
    }
}
