//! # Live Prices Source
//!
//! Per-resource prices (gas, rbh, ...) at a consensus time, in tinybars.

use super::fees::{tinycents_to_tinybars, ResourceKind, FEE_DIVISOR_FACTOR};
use crate::domain::transactions::Functionality;
use crate::domain::value_objects::Timestamp;
use crate::errors::PricingError;
use crate::ports::outbound::{HbarCentExchange, UsagePricesProvider};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// CONGESTION MULTIPLIER
// =============================================================================

/// Scales prices with network load.
pub trait CongestionMultiplier: Send + Sync {
    /// Multiplier for a function at a consensus time. Always >= 1.
    fn multiplier(&self, function: Functionality, at: Timestamp) -> i64;
}

/// Fixed multiplier of one. A replayed call cannot observe the load the
/// network was under at the time.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitMultiplier;

impl CongestionMultiplier for UnitMultiplier {
    fn multiplier(&self, _function: Functionality, _at: Timestamp) -> i64 {
        1
    }
}

// =============================================================================
// PRICES SOURCE
// =============================================================================

/// Resolves fee schedule entries to unit prices.
pub struct PricesSource {
    usage_prices: Arc<dyn UsagePricesProvider>,
    exchange: Arc<dyn HbarCentExchange>,
    multiplier: Arc<dyn CongestionMultiplier>,
}

impl PricesSource {
    /// Creates a source with the unit congestion multiplier.
    pub fn new(
        usage_prices: Arc<dyn UsagePricesProvider>,
        exchange: Arc<dyn HbarCentExchange>,
    ) -> Self {
        Self::with_multiplier(usage_prices, exchange, Arc::new(UnitMultiplier))
    }

    /// Creates a source with a custom congestion multiplier.
    pub fn with_multiplier(
        usage_prices: Arc<dyn UsagePricesProvider>,
        exchange: Arc<dyn HbarCentExchange>,
        multiplier: Arc<dyn CongestionMultiplier>,
    ) -> Self {
        Self {
            usage_prices,
            exchange,
            multiplier,
        }
    }

    /// The fee schedule provider.
    #[must_use]
    pub fn usage_prices(&self) -> &Arc<dyn UsagePricesProvider> {
        &self.usage_prices
    }

    /// The exchange rate provider.
    #[must_use]
    pub fn exchange(&self) -> &Arc<dyn HbarCentExchange> {
        &self.exchange
    }

    /// Gas price in tinybars.
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate at `now`.
    pub fn current_gas_price(
        &self,
        now: Timestamp,
        function: Functionality,
    ) -> Result<i64, PricingError> {
        self.current_price(now, function, ResourceKind::Gas)
    }

    /// Gas price in tinycents.
    ///
    /// # Errors
    ///
    /// Missing fee schedule at `now`.
    pub fn current_gas_price_in_tinycents(
        &self,
        now: Timestamp,
        function: Functionality,
    ) -> Result<i64, PricingError> {
        self.current_fee_in_tinycents(now, function, ResourceKind::Gas)
    }

    /// Price of one unit of `resource` in tinybars, floored at one and
    /// scaled by the congestion multiplier.
    ///
    /// Saturates at `i64::MAX` when the multiplier would overflow.
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate at `now`.
    pub fn current_price(
        &self,
        now: Timestamp,
        function: Functionality,
        resource: ResourceKind,
    ) -> Result<i64, PricingError> {
        let fee_in_tinycents = self.current_fee_in_tinycents(now, function, resource)?;
        let rate = self.exchange.rate(now)?;
        let fee_in_tinybars = tinycents_to_tinybars(fee_in_tinycents, &rate);
        let multiplier = self.multiplier.multiplier(function, now);

        let price = saturating_price(fee_in_tinybars, multiplier);
        trace!(%function, ?resource, fee_in_tinybars, multiplier, price, "resolved unit price");
        Ok(price)
    }

    fn current_fee_in_tinycents(
        &self,
        now: Timestamp,
        function: Functionality,
        resource: ResourceKind,
    ) -> Result<i64, PricingError> {
        let prices = self.usage_prices.default_prices_given(function, now)?;
        Ok(resource.extract(&prices.service) / FEE_DIVISOR_FACTOR)
    }
}

/// `max(1, fee) * multiplier`, or `i64::MAX` when that would overflow.
///
/// A non-positive fee bounds the multiplier as if it were one.
#[must_use]
pub fn saturating_price(fee_in_tinybars: i64, multiplier: i64) -> i64 {
    let unscaled = fee_in_tinybars.max(1);
    let max_multiplier = i64::MAX / unscaled;
    if multiplier > max_multiplier {
        i64::MAX
    } else {
        unscaled * multiplier
    }
}

// =============================================================================
// TESTS
// =============================================================================
