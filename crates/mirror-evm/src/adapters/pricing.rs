//! # Static Fee Inputs
//!
//! Timestamp-keyed fee schedules and exchange rates, plus a block hash
//! table. Each lookup picks the entry with the greatest effective time not
//! after the requested time.

use crate::domain::transactions::Functionality;
use crate::domain::value_objects::{Hash, Timestamp};
use crate::errors::PricingError;
use crate::ports::outbound::{BlockHashOracle, HbarCentExchange, UsagePricesProvider};
use crate::pricing::{ExchangeRate, FeeData, SubType};
use std::collections::{BTreeMap, HashMap};

type Schedule = HashMap<Functionality, HashMap<SubType, FeeData>>;

/// Fee schedules by effective second.
#[derive(Clone, Debug, Default)]
pub struct StaticFeeSchedule {
    schedules: BTreeMap<i64, Schedule>,
}

impl StaticFeeSchedule {
    /// Create an empty schedule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prices of one function and sub-type from `effective_from`
    /// onward. Functions not set on a later schedule are not inherited.
    #[must_use]
    pub fn with_prices(
        mut self,
        effective_from: Timestamp,
        function: Functionality,
        prices: FeeData,
    ) -> Self {
        self.schedules
            .entry(effective_from.seconds())
            .or_default()
            .entry(function)
            .or_default()
            .insert(prices.sub_type, prices);
        self
    }

    /// Same prices for every function in `functions`.
    #[must_use]
    pub fn with_prices_for(
        self,
        effective_from: Timestamp,
        functions: &[Functionality],
        prices: FeeData,
    ) -> Self {
        functions.iter().fold(self, |schedule, function| {
            schedule.with_prices(effective_from, *function, prices)
        })
    }
}

impl UsagePricesProvider for StaticFeeSchedule {
    fn prices_given(
        &self,
        function: Functionality,
        at: Timestamp,
    ) -> Result<HashMap<SubType, FeeData>, PricingError> {
        self.schedules
            .range(..=at.seconds())
            .next_back()
            .and_then(|(_, schedule)| schedule.get(&function))
            .cloned()
            .ok_or_else(|| PricingError::MissingFeeSchedule {
                function: function.to_string(),
                seconds: at.seconds(),
            })
    }
}

/// Exchange rates by effective second.
#[derive(Clone, Debug, Default)]
pub struct StaticExchangeRates {
    rates: BTreeMap<i64, ExchangeRate>,
}

impl StaticExchangeRates {
    /// A single rate valid from the epoch.
    #[must_use]
    pub fn fixed(rate: ExchangeRate) -> Self {
        Self::default().with_rate(Timestamp::from_seconds(0), rate)
    }

    /// Add a rate effective from `effective_from`.
    #[must_use]
    pub fn with_rate(mut self, effective_from: Timestamp, rate: ExchangeRate) -> Self {
        self.rates.insert(effective_from.seconds(), rate);
        self
    }
}

impl HbarCentExchange for StaticExchangeRates {
    fn rate(&self, at: Timestamp) -> Result<ExchangeRate, PricingError> {
        self.rates
            .range(..=at.seconds())
            .next_back()
            .map(|(_, rate)| *rate)
            .ok_or(PricingError::MissingExchangeRate(at.seconds()))
    }
}

/// Number of past blocks BLOCKHASH can see.
pub const BLOCK_HASH_WINDOW: u64 = 256;

/// Block hashes by number.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBlockHashes {
    hashes: HashMap<u64, Hash>,
}

impl InMemoryBlockHashes {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one block hash.
    #[must_use]
    pub fn with_block(mut self, number: u64, hash: Hash) -> Self {
        self.hashes.insert(number, hash);
        self
    }
}

impl BlockHashOracle for InMemoryBlockHashes {
    fn block_hash(&self, number: u64, current_number: u64) -> Option<Hash> {
        if number >= current_number || current_number - number > BLOCK_HASH_WINDOW {
            return None;
        }
        self.hashes.get(&number).copied()
    }
}
