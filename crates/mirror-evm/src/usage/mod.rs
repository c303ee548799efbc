//! # Usage Estimation
//!
//! Resource usage of synthetic transactions, and the calculators that turn
//! it into fees.

pub mod accessor;
pub mod accessor_based;
pub mod accumulator;
pub mod estimators;
pub mod fee_calculator;
pub mod priced;

pub use accessor::{SignedTxnAccessor, TxnAccessor};
pub use accessor_based::AccessorBasedUsages;
pub use accumulator::{
    sizes, BaseTransactionMeta, DefaultUsageProperties, SigUsage, UsageAccumulator,
    UsageProperties,
};
pub use estimators::{
    BaseResourceUsage, DefaultEstimatorFactory, EstimatorFactory, EstimatorUtils,
    TokenAssociateResourceUsage, TokenDeleteResourceUsage, TxnResourceUsageEstimator,
    TxnUsageEstimator,
};
pub use fee_calculator::UsageBasedFeeCalculator;
pub use priced::PricedUsageCalculator;
