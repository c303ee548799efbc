//! # Fee and Gas Pricing
//!
//! Gas price conversion, multiplier saturation and the ledger log cost,
//! driven through the public pricing types and the in-memory schedule.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mirror_evm::adapters::{StaticExchangeRates, StaticFeeSchedule};
    use mirror_evm::domain::transactions::Functionality;
    use mirror_evm::domain::value_objects::{Timestamp, U256};
    use mirror_evm::evm::{GasContext, LedgerGasCalculator};
    use mirror_evm::pricing::{
        saturating_price, CongestionMultiplier, ExchangeRate, FeeComponents, FeeData,
        PricesSource,
    };

    struct FixedMultiplier(i64);

    impl CongestionMultiplier for FixedMultiplier {
        fn multiplier(&self, _: Functionality, _: Timestamp) -> i64 {
            self.0
        }
    }

    fn schedule(service: FeeComponents) -> Arc<StaticFeeSchedule> {
        Arc::new(StaticFeeSchedule::new().with_prices(
            Timestamp::from_seconds(0),
            Functionality::ContractCall,
            FeeData {
                service,
                ..FeeData::default()
            },
        ))
    }

    fn rate() -> Arc<StaticExchangeRates> {
        Arc::new(StaticExchangeRates::fixed(ExchangeRate::new(2000, 200)))
    }

    #[test]
    fn test_gas_price_from_schedule_and_rate() {
        let source = PricesSource::new(
            schedule(FeeComponents {
                gas: 20_000,
                ..FeeComponents::default()
            }),
            rate(),
        );
        let now = Timestamp::from_seconds(1_000);

        // 20_000 thousandths of a tinycent = 20 tinycents = 200 tinybars.
        assert_eq!(
            source
                .current_gas_price_in_tinycents(now, Functionality::ContractCall)
                .unwrap(),
            20
        );
        assert_eq!(
            source
                .current_gas_price(now, Functionality::ContractCall)
                .unwrap(),
            200
        );
    }

    #[test]
    fn test_multiplier_saturates_exactly() {
        let fee = 1_000;
        let limit = i64::MAX / fee;
        assert_eq!(saturating_price(fee, limit + 1), i64::MAX);
        assert_eq!(saturating_price(fee, limit), fee * limit);
        assert_eq!(saturating_price(fee, 1), fee);
        // A zero fee is floored at one before scaling.
        assert_eq!(saturating_price(0, 7), 7);
    }

    #[test]
    fn test_congestion_multiplier_is_pluggable() {
        let gas = FeeComponents {
            gas: 20_000,
            ..FeeComponents::default()
        };
        let now = Timestamp::from_seconds(1);

        let doubled = PricesSource::with_multiplier(
            schedule(gas),
            rate(),
            Arc::new(FixedMultiplier(2)),
        );
        assert_eq!(
            doubled
                .current_gas_price(now, Functionality::ContractCall)
                .unwrap(),
            400
        );

        let overflowing = PricesSource::with_multiplier(
            schedule(gas),
            rate(),
            Arc::new(FixedMultiplier(i64::MAX)),
        );
        assert_eq!(
            overflowing
                .current_gas_price(now, Functionality::ContractCall)
                .unwrap(),
            i64::MAX
        );
    }

    #[test]
    fn test_missing_schedule_is_an_error() {
        let source = PricesSource::new(Arc::new(StaticFeeSchedule::new()), rate());
        assert!(source
            .current_gas_price(Timestamp::from_seconds(1), Functionality::ContractCall)
            .is_err());
    }

    #[test]
    fn test_log_cost_standard_formula_wins() {
        let calculator = LedgerGasCalculator::new(Arc::new(PricesSource::new(
            schedule(FeeComponents {
                rbh: 20_000,
                ..FeeComponents::default()
            }),
            rate(),
        )));
        let ctx = GasContext::contract_call(Timestamp::from_seconds(1_000), U256::from(2000));

        // 375 + 3 * 375 + 2 * 8
        assert_eq!(calculator.log_operation_gas_cost(&ctx, 2, 3).unwrap(), 1516);
    }

    #[test]
    fn test_log_cost_storage_formula_wins_at_low_gas_price() {
        let calculator = LedgerGasCalculator::new(Arc::new(PricesSource::new(
            schedule(FeeComponents {
                rbh: 20_000,
                ..FeeComponents::default()
            }),
            rate(),
        )));
        let ctx = GasContext::contract_call(Timestamp::from_seconds(1_000), U256::one());

        // (24 + 256) bytes * 200 tinybars * 180 s / 3600 s at 1 tinybar per gas.
        assert_eq!(calculator.log_operation_gas_cost(&ctx, 0, 0).unwrap(), 2800);
    }
}
