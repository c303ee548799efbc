//! # Precompile Pricing
//!
//! Converts token-operation fees into gas. A handler's gas is the larger
//! of its canonical minimum and the usage-based fee of its synthetic
//! transaction, divided by the gas price and marked up by a fifth.

use crate::domain::transactions::{Functionality, Transaction, TransactionBody};
use crate::domain::value_objects::{Address, Timestamp};
use crate::errors::PricingError;
use crate::pricing::{tinycents_to_tinybars, ExchangeRate, PricesSource, ResourceKind};
use crate::state::WorldView;
use crate::usage::{SignedTxnAccessor, UsageBasedFeeCalculator};
use std::sync::Arc;
use tracing::trace;

/// Floor applied by view functions before the markup.
pub const VIEW_MINIMUM_GAS: u64 = 100;

/// Canonical operation kinds with a minimum price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GasCostType {
    /// Token associate.
    Associate,
    /// Token dissociate.
    Dissociate,
    /// Fungible mint.
    MintFungible,
    /// NFT mint.
    MintNft,
    /// Fungible burn.
    BurnFungible,
    /// NFT burn.
    BurnNft,
    /// Fungible wipe.
    WipeFungible,
    /// NFT wipe.
    WipeNft,
    /// Fungible transfer.
    TransferFungible,
    /// NFT transfer.
    TransferNft,
    /// Allowance or NFT approval.
    Approve,
    /// Token create.
    Create,
    /// Pseudo-random seed.
    Prng,
}

impl GasCostType {
    /// Canonical price in tinycents (1 USD = 10^10 tinycents).
    #[must_use]
    pub const fn canonical_price_in_tinycents(self) -> i64 {
        match self {
            Self::Associate | Self::Dissociate | Self::Approve => 500_000_000,
            Self::MintNft => 200_000_000,
            Self::MintFungible
            | Self::BurnFungible
            | Self::BurnNft
            | Self::WipeFungible
            | Self::WipeNft
            | Self::TransferFungible
            | Self::TransferNft
            | Self::Prng => 10_000_000,
            Self::Create => 10_000_000_000,
        }
    }
}

/// Gas pricing shared by every token handler.
pub struct PrecompilePricing {
    prices: Arc<PricesSource>,
    fees: Arc<UsageBasedFeeCalculator>,
}

impl PrecompilePricing {
    /// Creates pricing over a prices source and a fee calculator.
    pub fn new(prices: Arc<PricesSource>, fees: Arc<UsageBasedFeeCalculator>) -> Self {
        Self { prices, fees }
    }

    /// Exchange rate active at `at`.
    ///
    /// # Errors
    ///
    /// No exchange rate covers `at`.
    pub fn exchange_rate(&self, at: Timestamp) -> Result<ExchangeRate, PricingError> {
        self.prices.exchange().rate(at)
    }

    /// Canonical minimum converted at the rate active at `at`.
    ///
    /// # Errors
    ///
    /// No exchange rate covers `at`.
    pub fn minimum_price_in_tinybars(
        &self,
        kind: GasCostType,
        at: Timestamp,
    ) -> Result<i64, PricingError> {
        let rate = self.exchange_rate(at)?;
        Ok(tinycents_to_tinybars(kind.canonical_price_in_tinycents(), &rate))
    }

    fn gas_price(&self, at: Timestamp) -> Result<u64, PricingError> {
        let price = self.prices.current_gas_price(at, Functionality::ContractCall)?;
        Ok(price.max(1).unsigned_abs())
    }

    fn to_gas(fee_in_tinybars: i64, gas_price: u64) -> u64 {
        let base = fee_in_tinybars.max(0).unsigned_abs().div_ceil(gas_price);
        base.saturating_add(base / 5)
    }

    /// Gas for a state-changing handler.
    ///
    /// # Arguments
    ///
    /// * `block_timestamp` - Timestamp the fee schedule and rate are read at
    /// * `minimum_fee_in_tinybars` - Handler's canonical floor
    /// * `body` - Synthetic transaction the handler would submit
    /// * `sender` - Payer of that transaction
    /// * `view` - State the usage estimators read
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate at `block_timestamp`.
    pub fn compute_gas_requirement(
        &self,
        block_timestamp: Timestamp,
        minimum_fee_in_tinybars: i64,
        body: TransactionBody,
        sender: Address,
        view: &dyn WorldView,
    ) -> Result<u64, PricingError> {
        let gas_price = self.gas_price(block_timestamp)?;
        let accessor = SignedTxnAccessor::new(Transaction::new(sender, block_timestamp, body))?;
        let calculated = self
            .fees
            .compute_fee(&accessor, 0, view, block_timestamp)?
            .total();
        let actual = minimum_fee_in_tinybars.max(calculated);
        let gas = Self::to_gas(actual, gas_price);
        trace!(minimum_fee_in_tinybars, calculated, gas_price, gas, "precompile gas");
        Ok(gas)
    }

    /// Gas for a view handler: the larger of `minimum_gas` and the query
    /// price, marked up like any other handler.
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate at `now`.
    pub fn compute_view_function_gas(
        &self,
        now: Timestamp,
        minimum_gas: u64,
    ) -> Result<u64, PricingError> {
        let gas_price = self.gas_price(now)?;
        let calculated =
            self.prices
                .current_price(now, Functionality::TokenGetInfo, ResourceKind::Constant)?;
        let minimum = i64::try_from(minimum_gas.saturating_mul(gas_price)).unwrap_or(i64::MAX);
        Ok(Self::to_gas(minimum.max(calculated), gas_price))
    }

    /// Gas for a fixed-price system call: the canonical minimum, marked up.
    ///
    /// # Errors
    ///
    /// Missing fee schedule or exchange rate at `now`.
    pub fn compute_minimum_gas(&self, now: Timestamp, kind: GasCostType) -> Result<u64, PricingError> {
        let gas_price = self.gas_price(now)?;
        Ok(Self::to_gas(self.minimum_price_in_tinybars(kind, now)?, gas_price))
    }
}

// =============================================================================
// TESTS
// =============================================================================
