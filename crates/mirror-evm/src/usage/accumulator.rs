//! # Usage Accumulator
//!
//! Running totals of billable resources for one fee computation. An
//! accumulator is reset (or freshly allocated) per transaction and never
//! shared between unrelated transactions.

use serde::{Deserialize, Serialize};

// =============================================================================
// SIZES
// =============================================================================

/// Byte sizes used by the usage estimators.
pub mod sizes {
    /// 64-bit field.
    pub const LONG_SIZE: i64 = 8;
    /// 32-bit field.
    pub const INT_SIZE: i64 = 4;
    /// Boolean field.
    pub const BOOL_SIZE: i64 = 4;
    /// `shard.realm.num`.
    pub const BASIC_ENTITY_ID_SIZE: i64 = 3 * LONG_SIZE;
    /// Account plus signed amount.
    pub const BASIC_ACCOUNT_AMT_SIZE: i64 = BASIC_ENTITY_ID_SIZE + LONG_SIZE;
    /// Payer plus valid-start.
    pub const BASIC_TX_ID_SIZE: i64 = BASIC_ENTITY_ID_SIZE + LONG_SIZE;
    /// Two ints and an expiry.
    pub const EXCHANGE_RATE_SIZE: i64 = 2 * INT_SIZE + LONG_SIZE;
    /// Status plus current and next rate.
    pub const BASIC_RECEIPT_SIZE: i64 = INT_SIZE + 2 * EXCHANGE_RATE_SIZE;
    /// Node account, transaction id, fee and valid duration.
    pub const BASIC_TX_BODY_SIZE: i64 = BASIC_ENTITY_ID_SIZE + BASIC_TX_ID_SIZE + 2 * LONG_SIZE;
    /// SHA-384 transaction hash.
    pub const TX_HASH_SIZE: i64 = 48;
    /// Receipt, hash, consensus time, id and fee.
    pub const BASIC_TX_RECORD_SIZE: i64 =
        BASIC_RECEIPT_SIZE + TX_HASH_SIZE + LONG_SIZE + BASIC_TX_ID_SIZE + LONG_SIZE;
    /// How long receipts are kept in state.
    pub const RECEIPT_STORAGE_TIME_SEC: i64 = 180;
    /// Seconds per hour; rbs/sbs are divided by this to get hours.
    pub const HRS_DIVISOR: i64 = 3600;
    /// State bytes for one token relationship.
    pub const TOKEN_REL_BYTES: i64 = 3 * BASIC_ENTITY_ID_SIZE + 2 * BOOL_SIZE + LONG_SIZE;
    /// State bytes for one NFT.
    pub const NFT_BYTES: i64 = BASIC_ENTITY_ID_SIZE + 2 * LONG_SIZE;
}

use sizes::{
    BASIC_RECEIPT_SIZE, BASIC_TX_BODY_SIZE, HRS_DIVISOR, INT_SIZE, RECEIPT_STORAGE_TIME_SEC,
};

/// `dividend / divisor`, but never rounds a positive value down to zero.
#[must_use]
pub fn non_degenerate_div(dividend: i64, divisor: i64) -> i64 {
    if dividend == 0 || divisor == 0 {
        0
    } else {
        (dividend / divisor).max(1)
    }
}

// =============================================================================
// INPUTS
// =============================================================================

/// Signature usage of one transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigUsage {
    /// Total signatures.
    pub num_sigs: i32,
    /// Total signature bytes.
    pub sigs_size: i32,
    /// Keys on the payer.
    pub num_payer_keys: i32,
}

impl SigUsage {
    /// Creates a signature usage record.
    #[must_use]
    pub const fn new(num_sigs: i32, sigs_size: i32, num_payer_keys: i32) -> Self {
        Self {
            num_sigs,
            sigs_size,
            num_payer_keys,
        }
    }
}

/// Transaction-wide usage facts independent of the body kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTransactionMeta {
    /// Memo length in UTF-8 bytes.
    pub memo_utf8_bytes: i32,
    /// Number of explicit hbar transfers.
    pub num_explicit_transfers: i32,
}

/// Tunable sizes used when pricing transfers.
pub trait UsageProperties: Send + Sync {
    /// Bytes for one fungible account amount.
    fn account_amount_bytes(&self) -> i32;
    /// Bytes for one NFT transfer.
    fn nft_transfer_bytes(&self) -> i32;
    /// Receipt retention for legacy pricing.
    fn legacy_receipt_storage_secs(&self) -> i64;
}

/// The protocol defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultUsageProperties;

impl UsageProperties for DefaultUsageProperties {
    fn account_amount_bytes(&self) -> i32 {
        (sizes::LONG_SIZE + sizes::BASIC_ENTITY_ID_SIZE) as i32
    }

    fn nft_transfer_bytes(&self) -> i32 {
        (sizes::LONG_SIZE + 2 * sizes::BASIC_ENTITY_ID_SIZE) as i32
    }

    fn legacy_receipt_storage_secs(&self) -> i64 {
        RECEIPT_STORAGE_TIME_SEC
    }
}

// =============================================================================
// ACCUMULATOR
// =============================================================================

/// Running resource totals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageAccumulator {
    universal_bpt: i64,
    network_vpt: i64,
    network_rbh: i64,
    node_bpr: i64,
    node_sbpr: i64,
    node_vpt: i64,
    service_rbh: i64,
    service_sbh: i64,
    nft_transfers: i64,
}

impl UsageAccumulator {
    /// Creates a zeroed accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the totals every transaction pays regardless of kind.
    pub fn reset_for_transaction(&mut self, base: &BaseTransactionMeta, sig_usage: &SigUsage) {
        let memo_bytes = i64::from(base.memo_utf8_bytes);
        let num_transfers = i64::from(base.num_explicit_transfers);

        self.universal_bpt =
            BASIC_TX_BODY_SIZE + memo_bytes + i64::from(sig_usage.sigs_size);
        self.network_vpt = i64::from(sig_usage.num_sigs);
        self.network_rbh = non_degenerate_div(
            BASIC_RECEIPT_SIZE * RECEIPT_STORAGE_TIME_SEC,
            HRS_DIVISOR,
        );
        self.node_bpr = INT_SIZE;
        self.node_sbpr = 0;
        self.node_vpt = i64::from(sig_usage.num_payer_keys);
        self.service_rbh = 0;
        self.service_sbh = 0;
        self.nft_transfers = 0;
        self.add_bpt(sizes::BASIC_ACCOUNT_AMT_SIZE * num_transfers);
    }

    /// Adds transaction bytes.
    pub fn add_bpt(&mut self, amount: i64) {
        self.universal_bpt = self.universal_bpt.saturating_add(amount);
    }

    /// Adds signature verifications.
    pub fn add_vpt(&mut self, amount: i64) {
        self.network_vpt = self.network_vpt.saturating_add(amount);
    }

    /// Adds service RAM byte-seconds.
    pub fn add_rbs(&mut self, amount: i64) {
        self.service_rbh = self
            .service_rbh
            .saturating_add(non_degenerate_div(amount, HRS_DIVISOR));
    }

    /// Adds service storage byte-seconds.
    pub fn add_sbs(&mut self, amount: i64) {
        self.service_sbh = self
            .service_sbh
            .saturating_add(non_degenerate_div(amount, HRS_DIVISOR));
    }

    /// Adds network RAM byte-seconds.
    pub fn add_network_rbs(&mut self, amount: i64) {
        self.network_rbh = self
            .network_rbh
            .saturating_add(non_degenerate_div(amount, HRS_DIVISOR));
    }

    /// Counts NFT movements.
    pub fn add_nft_transfers(&mut self, count: i64) {
        self.nft_transfers = self.nft_transfers.saturating_add(count);
    }

    /// Bytes per transaction, charged to every party.
    #[must_use]
    pub fn universal_bpt(&self) -> i64 {
        self.universal_bpt
    }

    /// Network signature verifications.
    #[must_use]
    pub fn network_vpt(&self) -> i64 {
        self.network_vpt
    }

    /// Network RAM byte-hours.
    #[must_use]
    pub fn network_rbh(&self) -> i64 {
        self.network_rbh
    }

    /// Node response bytes.
    #[must_use]
    pub fn node_bpr(&self) -> i64 {
        self.node_bpr
    }

    /// Node storage response bytes.
    #[must_use]
    pub fn node_sbpr(&self) -> i64 {
        self.node_sbpr
    }

    /// Node signature verifications.
    #[must_use]
    pub fn node_vpt(&self) -> i64 {
        self.node_vpt
    }

    /// Service RAM byte-hours.
    #[must_use]
    pub fn service_rbh(&self) -> i64 {
        self.service_rbh
    }

    /// Service storage byte-hours.
    #[must_use]
    pub fn service_sbh(&self) -> i64 {
        self.service_sbh
    }

    /// NFT movements counted.
    #[must_use]
    pub fn nft_transfers(&self) -> i64 {
        self.nft_transfers
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_seeds_base_usage() {
        let mut acc = UsageAccumulator::new();
        let base = BaseTransactionMeta {
            memo_utf8_bytes: 10,
            num_explicit_transfers: 2,
        };
        let sigs = SigUsage::new(3, 192, 1);
        acc.reset_for_transaction(&base, &sigs);

        assert_eq!(
            acc.universal_bpt(),
            BASIC_TX_BODY_SIZE + 10 + 192 + 2 * sizes::BASIC_ACCOUNT_AMT_SIZE
        );
        assert_eq!(acc.network_vpt(), 3);
        assert_eq!(acc.node_vpt(), 1);
        assert_eq!(acc.node_bpr(), INT_SIZE);
        assert_eq!(acc.service_rbh(), 0);
    }

    #[test]
    fn test_reset_discards_previous_totals() {
        let mut acc = UsageAccumulator::new();
        acc.add_rbs(7200);
        acc.add_nft_transfers(4);
        acc.reset_for_transaction(&BaseTransactionMeta::default(), &SigUsage::default());
        assert_eq!(acc.service_rbh(), 0);
        assert_eq!(acc.nft_transfers(), 0);
    }

    #[test]
    fn test_byte_seconds_convert_to_hours() {
        let mut acc = UsageAccumulator::new();
        acc.add_rbs(7200);
        assert_eq!(acc.service_rbh(), 2);
        // Anything positive is at least one hour.
        acc.add_sbs(1);
        assert_eq!(acc.service_sbh(), 1);
    }

    #[test]
    fn test_non_degenerate_div() {
        assert_eq!(non_degenerate_div(0, 3600), 0);
        assert_eq!(non_degenerate_div(5, 3600), 1);
        assert_eq!(non_degenerate_div(7200, 3600), 2);
    }

    #[test]
    fn test_default_usage_properties() {
        let props = DefaultUsageProperties;
        assert_eq!(props.account_amount_bytes(), 32);
        assert_eq!(props.nft_transfer_bytes(), 56);
        assert_eq!(props.legacy_receipt_storage_secs(), 180);
    }
}
