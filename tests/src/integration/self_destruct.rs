//! # SELFDESTRUCT Halt Order
//!
//! Self-beneficiary, then treasury, then token balances, then NFTs. On
//! Cancun-based versions the ledger checks only apply to contracts created
//! in the same call.

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use mirror_evm::domain::entities::Account;
    use mirror_evm::domain::value_objects::{SemanticVersion, U256};
    use mirror_evm::errors::ExceptionalHaltReason;
    use mirror_evm::ports::inbound::SimulationApi;

    /// ADDRESS SELFDESTRUCT
    const DESTRUCT_TO_SELF: [u8; 2] = [0x30, 0xff];
    /// PUSH2 SENDER SELFDESTRUCT
    const DESTRUCT_TO_SENDER: [u8; 4] = [0x61, 0x03, 0xea, 0xff];

    fn doomed(code: &[u8], treasury: bool, balances: bool, nfts: bool) -> Account {
        Account {
            balance: U256::from(100),
            num_treasury_titles: u32::from(treasury),
            num_positive_balances: u32::from(balances),
            owned_nfts: u64::from(nfts),
            ..contract(CONTRACT, code)
        }
    }

    async fn halt_on(
        account: Account,
        minor: u32,
    ) -> (bool, Option<ExceptionalHaltReason>) {
        let service = service(snapshot_with(vec![account]));
        let result = service
            .call(
                call_to(CONTRACT, Vec::new())
                    .with_version_hint(SemanticVersion::new(0, minor, 0)),
            )
            .await
            .unwrap();
        (result.success, result.halt_reason)
    }

    #[tokio::test]
    async fn test_self_beneficiary_wins_over_every_ledger_check() {
        for minor in [30, 34, 38, 46] {
            let account = doomed(&DESTRUCT_TO_SELF, true, true, true);
            let (success, halt) = halt_on(account, minor).await;
            assert!(!success, "0.{minor}");
            assert_eq!(halt, Some(ExceptionalHaltReason::SelfDestructToSelf), "0.{minor}");
        }
    }

    #[tokio::test]
    async fn test_treasury_checked_before_nfts() {
        for minor in [34, 38] {
            let account = doomed(&DESTRUCT_TO_SENDER, true, false, true);
            let (_, halt) = halt_on(account, minor).await;
            assert_eq!(halt, Some(ExceptionalHaltReason::ContractIsTreasury), "0.{minor}");
        }
    }

    #[tokio::test]
    async fn test_balances_checked_before_nfts() {
        let (_, halt) = halt_on(doomed(&DESTRUCT_TO_SENDER, false, true, true), 34).await;
        assert_eq!(
            halt,
            Some(ExceptionalHaltReason::TransactionRequiresZeroTokenBalances)
        );

        let (_, halt) = halt_on(doomed(&DESTRUCT_TO_SENDER, false, false, true), 34).await;
        assert_eq!(halt, Some(ExceptionalHaltReason::ContractStillOwnsNfts));
    }

    #[tokio::test]
    async fn test_clean_contract_self_destructs() {
        let (success, halt) = halt_on(doomed(&DESTRUCT_TO_SENDER, false, false, false), 34).await;
        assert!(success);
        assert_eq!(halt, None);
    }

    #[tokio::test]
    async fn test_cancun_skips_ledger_checks_for_existing_contracts() {
        let account = doomed(&DESTRUCT_TO_SENDER, true, true, true);
        let (success, halt) = halt_on(account, 50).await;
        assert!(success);
        assert_eq!(halt, None);
    }
}
