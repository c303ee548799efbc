//! # Fee Schedule Primitives
//!
//! Fee schedule components are stored in thousandths of a tinycent.
//! Everything here is integer arithmetic; overflow saturates.

use crate::errors::PricingError;
use serde::{Deserialize, Serialize};

/// Schedule values are stored in thousandths of a tinycent.
pub const FEE_DIVISOR_FACTOR: i64 = 1000;

// =============================================================================
// FEE COMPONENTS
// =============================================================================

/// Per-resource prices for one fee party (node, network or service).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeComponents {
    /// Lower clamp for the computed fee.
    pub min: i64,
    /// Upper clamp for the computed fee.
    pub max: i64,
    /// Flat part.
    pub constant: i64,
    /// Per byte of transaction.
    pub bpt: i64,
    /// Per signature verification.
    pub vpt: i64,
    /// Per RAM byte-hour.
    pub rbh: i64,
    /// Per storage byte-hour.
    pub sbh: i64,
    /// Per unit of EVM gas.
    pub gas: i64,
    /// Per tinybar transferred.
    pub tv: i64,
    /// Per byte of response.
    pub bpr: i64,
    /// Per storage byte of response.
    pub sbpr: i64,
}

/// Resource selector over [`FeeComponents`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Flat part.
    Constant,
    /// Bytes per transaction.
    Bpt,
    /// Verifications per transaction.
    Vpt,
    /// RAM byte-hours.
    Rbh,
    /// Storage byte-hours.
    Sbh,
    /// EVM gas.
    Gas,
    /// Transferred value.
    Tv,
    /// Bytes per response.
    Bpr,
    /// Storage bytes per response.
    Sbpr,
}

impl ResourceKind {
    /// Reads this resource's price from a component set.
    #[must_use]
    pub const fn extract(self, components: &FeeComponents) -> i64 {
        match self {
            Self::Constant => components.constant,
            Self::Bpt => components.bpt,
            Self::Vpt => components.vpt,
            Self::Rbh => components.rbh,
            Self::Sbh => components.sbh,
            Self::Gas => components.gas,
            Self::Tv => components.tv,
            Self::Bpr => components.bpr,
            Self::Sbpr => components.sbpr,
        }
    }
}

/// Fee sub-type; token operations price fungible and unique tokens apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubType {
    /// Generic price.
    #[default]
    Default,
    /// Fungible token price.
    TokenFungibleCommon,
    /// Non-fungible token price.
    TokenNonFungibleUnique,
}

/// Prices for the three fee parties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeData {
    /// Paid to the submitting node.
    pub node: FeeComponents,
    /// Paid to the network.
    pub network: FeeComponents,
    /// Paid for the service itself.
    pub service: FeeComponents,
    /// Sub-type these prices apply to.
    pub sub_type: SubType,
}

// =============================================================================
// EXCHANGE RATE
// =============================================================================

/// Hbar/cent ratio valid until `expiration_time`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Hbar side of the ratio.
    pub hbar_equiv: i32,
    /// Cent side of the ratio.
    pub cent_equiv: i32,
    /// Expiry in consensus seconds.
    pub expiration_time: i64,
}

impl ExchangeRate {
    /// Creates a rate that never expires.
    #[must_use]
    pub const fn new(hbar_equiv: i32, cent_equiv: i32) -> Self {
        Self {
            hbar_equiv,
            cent_equiv,
            expiration_time: i64::MAX,
        }
    }

    /// Rejects rates that cannot be used as a divisor.
    ///
    /// # Errors
    ///
    /// `PricingError::InvalidExchangeRate` when `cent_equiv <= 0`.
    pub fn validate(&self) -> Result<(), PricingError> {
        if self.cent_equiv <= 0 || self.hbar_equiv < 0 {
            return Err(PricingError::InvalidExchangeRate {
                hbar_equiv: self.hbar_equiv,
                cent_equiv: self.cent_equiv,
            });
        }
        Ok(())
    }
}

/// Converts tinycents to tinybars at `rate`, saturating at `i64::MAX`.
///
/// A rate with a non-positive cent side converts to zero.
#[must_use]
pub fn tinycents_to_tinybars(tinycents: i64, rate: &ExchangeRate) -> i64 {
    if rate.cent_equiv <= 0 {
        return 0;
    }
    let value = i128::from(tinycents) * i128::from(rate.hbar_equiv) / i128::from(rate.cent_equiv);
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

// =============================================================================
// FEE OBJECT
// =============================================================================

/// Fees in tinybars, split by party.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeObject {
    /// Node fee.
    pub node_fee: i64,
    /// Network fee.
    pub network_fee: i64,
    /// Service fee.
    pub service_fee: i64,
}

impl FeeObject {
    /// Sum of all parts, saturating.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.node_fee
            .saturating_add(self.network_fee)
            .saturating_add(self.service_fee)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_extract() {
        let components = FeeComponents {
            gas: 852_000,
            rbh: 20_000,
            bpt: 7,
            ..FeeComponents::default()
        };
        assert_eq!(ResourceKind::Gas.extract(&components), 852_000);
        assert_eq!(ResourceKind::Rbh.extract(&components), 20_000);
        assert_eq!(ResourceKind::Bpt.extract(&components), 7);
        assert_eq!(ResourceKind::Sbh.extract(&components), 0);
    }

    #[test]
    fn test_tinycents_to_tinybars() {
        let rate = ExchangeRate::new(2000, 200);
        assert_eq!(tinycents_to_tinybars(20, &rate), 200);
        assert_eq!(tinycents_to_tinybars(0, &rate), 0);
    }

    #[test]
    fn test_tinycents_to_tinybars_saturates() {
        let rate = ExchangeRate::new(i32::MAX, 1);
        assert_eq!(tinycents_to_tinybars(i64::MAX, &rate), i64::MAX);
    }

    #[test]
    fn test_exchange_rate_validation() {
        assert!(ExchangeRate::new(1, 12).validate().is_ok());
        assert!(ExchangeRate::new(1, 0).validate().is_err());
        assert_eq!(tinycents_to_tinybars(100, &ExchangeRate::new(1, 0)), 0);
    }

    #[test]
    fn test_fee_object_total_saturates() {
        let fees = FeeObject {
            node_fee: i64::MAX,
            network_fee: 1,
            service_fee: 1,
        };
        assert_eq!(fees.total(), i64::MAX);
    }
}
