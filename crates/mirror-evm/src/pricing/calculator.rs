//! # Overflow-Checking Fee Calculator
//!
//! Turns resource usage into node, network and service fees. All
//! intermediate sums saturate at `i64::MAX` instead of wrapping.

use super::fees::{tinycents_to_tinybars, ExchangeRate, FeeComponents, FeeData, FeeObject, FEE_DIVISOR_FACTOR};
use crate::usage::UsageAccumulator;

/// Fee calculator over [`UsageAccumulator`] totals.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverflowCheckingCalc;

impl OverflowCheckingCalc {
    /// Creates a calculator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Prices accumulated usage.
    ///
    /// # Arguments
    ///
    /// * `usage` - Resource totals for one transaction
    /// * `prices` - Fee schedule entry for the transaction's function
    /// * `rate` - Active hbar/cent exchange rate
    /// * `multiplier` - Congestion multiplier
    ///
    /// # Returns
    ///
    /// Fees in tinybars, each part saturating at `i64::MAX`.
    #[must_use]
    pub fn fees(
        &self,
        usage: &UsageAccumulator,
        prices: &FeeData,
        rate: &ExchangeRate,
        multiplier: i64,
    ) -> FeeObject {
        let network = network_fee_in_tinycents(usage, &prices.network);
        let node = node_fee_in_tinycents(usage, &prices.node);
        let service = service_fee_in_tinycents(usage, &prices.service);

        FeeObject {
            node_fee: scaled_tinybars(node, rate, multiplier),
            network_fee: scaled_tinybars(network, rate, multiplier),
            service_fee: scaled_tinybars(service, rate, multiplier),
        }
    }

    /// Prices a usage vector expressed as [`FeeData`] quantities, as the
    /// per-transaction resource estimators produce.
    #[must_use]
    pub fn fees_from_usage(
        &self,
        prices: &FeeData,
        usage: &FeeData,
        rate: &ExchangeRate,
        multiplier: i64,
    ) -> FeeObject {
        let node = component_fee_in_tinycents(&prices.node, &usage.node);
        let network = component_fee_in_tinycents(&prices.network, &usage.network);
        let service = component_fee_in_tinycents(&prices.service, &usage.service);

        FeeObject {
            node_fee: scaled_tinybars(node, rate, multiplier),
            network_fee: scaled_tinybars(network, rate, multiplier),
            service_fee: scaled_tinybars(service, rate, multiplier),
        }
    }
}

// =============================================================================
// PARTY FEES
// =============================================================================

fn network_fee_in_tinycents(usage: &UsageAccumulator, prices: &FeeComponents) -> i64 {
    let nominal = safe_accumulate(
        prices.constant,
        &[
            (usage.universal_bpt(), prices.bpt),
            (usage.network_vpt(), prices.vpt),
            (usage.network_rbh(), prices.rbh),
        ],
    );
    constrained_tinycent_fee(nominal, prices.min, prices.max)
}

fn node_fee_in_tinycents(usage: &UsageAccumulator, prices: &FeeComponents) -> i64 {
    let nominal = safe_accumulate(
        prices.constant,
        &[
            (usage.universal_bpt(), prices.bpt),
            (usage.node_vpt(), prices.vpt),
            (usage.node_bpr(), prices.bpr),
            (usage.node_sbpr(), prices.sbpr),
        ],
    );
    constrained_tinycent_fee(nominal, prices.min, prices.max)
}

fn service_fee_in_tinycents(usage: &UsageAccumulator, prices: &FeeComponents) -> i64 {
    let nominal = safe_accumulate(
        prices.constant,
        &[
            (usage.service_rbh(), prices.rbh),
            (usage.service_sbh(), prices.sbh),
        ],
    );
    constrained_tinycent_fee(nominal, prices.min, prices.max)
}

fn component_fee_in_tinycents(prices: &FeeComponents, usage: &FeeComponents) -> i64 {
    let nominal = safe_accumulate(
        0,
        &[
            (usage.constant, prices.constant),
            (usage.bpt, prices.bpt),
            (usage.vpt, prices.vpt),
            (usage.rbh, prices.rbh),
            (usage.sbh, prices.sbh),
            (usage.gas, prices.gas),
            (usage.tv, prices.tv),
            (usage.bpr, prices.bpr),
            (usage.sbpr, prices.sbpr),
        ],
    );
    constrained_tinycent_fee(nominal, prices.min, prices.max)
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// `base + sum(amount * price)`, saturating.
fn safe_accumulate(base: i64, terms: &[(i64, i64)]) -> i64 {
    terms.iter().fold(base, |acc, (amount, price)| {
        acc.saturating_add(amount.saturating_mul(*price))
    })
}

/// Clamps the nominal fee to `[min, max]`, then drops the thousandths.
fn constrained_tinycent_fee(nominal: i64, min: i64, max: i64) -> i64 {
    let clamped = if nominal < min {
        min
    } else if nominal > max {
        max
    } else {
        nominal
    };
    clamped / FEE_DIVISOR_FACTOR
}

fn scaled_tinybars(tinycents: i64, rate: &ExchangeRate, multiplier: i64) -> i64 {
    tinycents_to_tinybars(tinycents, rate).saturating_mul(multiplier)
}

// =============================================================================
// TESTS
// =============================================================================
