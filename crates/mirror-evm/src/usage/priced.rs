//! # Priced Usage Calculator
//!
//! Prices the functions [`AccessorBasedUsages`] can assess. Congestion
//! pricing is not replayed: the multiplier is always one.
//!
//! The calculator holds no mutable state; the handle-scoped accumulator
//! belongs to the pricing call that passes it in.

use super::accessor::TxnAccessor;
use super::accessor_based::AccessorBasedUsages;
use super::accumulator::UsageAccumulator;
use crate::domain::transactions::Functionality;
use crate::errors::PricingError;
use crate::pricing::{ExchangeRate, FeeData, FeeObject, OverflowCheckingCalc};

const NO_CONGESTION: i64 = 1;

/// Accumulator-backed fee pricing.
pub struct PricedUsageCalculator {
    usages: AccessorBasedUsages,
    calculator: OverflowCheckingCalc,
}

impl PricedUsageCalculator {
    /// Creates a calculator.
    #[must_use]
    pub fn new(usages: AccessorBasedUsages, calculator: OverflowCheckingCalc) -> Self {
        Self { usages, calculator }
    }

    /// True when `function` is priced here.
    #[must_use]
    pub fn supports(&self, function: Functionality) -> bool {
        self.usages.supports(function)
    }

    /// Fees assessed into the caller's handle-scoped `accumulator`, which
    /// keeps the usage totals afterwards.
    ///
    /// # Errors
    ///
    /// `PricingError::UnknownFunction` for unsupported functions.
    pub fn in_handle_fees(
        &self,
        accessor: &dyn TxnAccessor,
        prices: &FeeData,
        rate: &ExchangeRate,
        num_payer_keys: i32,
        accumulator: &mut UsageAccumulator,
    ) -> Result<FeeObject, PricingError> {
        let sig_usage = accessor.usage_given(num_payer_keys);
        self.usages.assess(&sig_usage, accessor, accumulator)?;
        Ok(self.calculator.fees(accumulator, prices, rate, NO_CONGESTION))
    }

    /// Fees computed in a fresh accumulator.
    ///
    /// # Errors
    ///
    /// `PricingError::UnknownFunction` for unsupported functions.
    pub fn extra_handle_fees(
        &self,
        accessor: &dyn TxnAccessor,
        prices: &FeeData,
        rate: &ExchangeRate,
        num_payer_keys: i32,
    ) -> Result<FeeObject, PricingError> {
        let mut accumulator = UsageAccumulator::new();
        self.in_handle_fees(accessor, prices, rate, num_payer_keys, &mut accumulator)
    }
}
