//! # Pricing
//!
//! Fee schedule primitives, the overflow-checking fee calculator and
//! per-resource unit prices.
//!
//! ## Units
//!
//! - Fee schedules are in thousandths of a tinycent
//! - Prices returned to callers are in tinybars
//! - Overflow saturates at `i64::MAX`

pub mod calculator;
pub mod fees;
pub mod prices;

pub use calculator::OverflowCheckingCalc;
pub use fees::{
    tinycents_to_tinybars, ExchangeRate, FeeComponents, FeeData, FeeObject, ResourceKind,
    SubType, FEE_DIVISOR_FACTOR,
};
pub use prices::{saturating_price, CongestionMultiplier, PricesSource, UnitMultiplier};
