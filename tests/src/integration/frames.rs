//! # Frame Isolation
//!
//! A reverted child frame leaves its parent untouched, both at the updater
//! level and through nested EVM calls.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fixtures::*;
    use mirror_evm::domain::entities::{Account, TokenRelationship};
    use mirror_evm::domain::value_objects::{StorageKey, StorageValue, Timestamp, U256};
    use mirror_evm::ports::inbound::SimulationApi;
    use mirror_evm::state::{SimulatedSequencer, WorldStateView, WorldView};

    /// CALL `CALLEE` with value 5 and no data, then return `CALLEE`'s balance.
    const PAY_AND_READ: [u8; 28] = [
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x05, 0x61, 0x07, 0xd0, 0x5a, 0xf1,
        0x50, 0x61, 0x07, 0xd0, 0x31, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    /// PUSH1 0 PUSH1 0 REVERT
    const REVERTS: [u8; 5] = [0x60, 0x00, 0x60, 0x00, 0xfd];
    /// STOP
    const ACCEPTS: [u8; 1] = [0x00];

    fn root() -> WorldStateView {
        WorldStateView::new(
            Arc::new(with_tokens(snapshot_with(vec![contract(CONTRACT, &ACCEPTS)]))),
            Arc::new(SimulatedSequencer::new(1_000_000_000)),
            true,
            Timestamp::from_seconds(1),
        )
    }

    fn key() -> StorageKey {
        StorageKey::from(U256::from(1))
    }

    #[test]
    fn test_reverted_grandchild_only_drops_its_own_writes() {
        let root = root();
        let mut top = root.updater();
        {
            let mut child = top.updater();
            child.set_storage(addr(CONTRACT), key(), StorageValue::from(U256::from(1)));
            {
                let mut grandchild = child.updater();
                grandchild.set_storage(addr(CONTRACT), key(), StorageValue::from(U256::from(2)));
                grandchild.put_relationship(
                    addr(CONTRACT),
                    addr(TOKEN_A),
                    Some(TokenRelationship {
                        account: addr(CONTRACT),
                        token: addr(TOKEN_A),
                        ..TokenRelationship::default()
                    }),
                );
                grandchild.revert();
            }
            assert_eq!(
                child.storage(&addr(CONTRACT), &key()).unwrap(),
                StorageValue::from(U256::from(1))
            );
            assert!(child
                .relationship(&addr(CONTRACT), &addr(TOKEN_A))
                .unwrap()
                .is_none());
            child.commit();
        }
        assert_eq!(
            top.storage(&addr(CONTRACT), &key()).unwrap(),
            StorageValue::from(U256::from(1))
        );
        assert_eq!(
            top.original_storage(&addr(CONTRACT), &key()).unwrap(),
            StorageValue::ZERO
        );
    }

    #[test]
    fn test_reverted_child_restores_deleted_account() {
        let root = root();
        let mut top = root.updater();
        {
            let mut child = top.updater();
            child.delete_account(&addr(CONTRACT)).unwrap();
            assert!(!child.exists(&addr(CONTRACT)).unwrap());
            child.revert();
        }
        assert!(top.exists(&addr(CONTRACT)).unwrap());
        assert!(top.journal().is_empty());
    }

    async fn callee_balance_after_payment(callee_code: &[u8]) -> U256 {
        let parent = Account {
            balance: U256::from(100),
            ..contract(CONTRACT, &PAY_AND_READ)
        };
        let service = service(snapshot_with(vec![parent, contract(CALLEE, callee_code)]));
        let result = service.call(call_to(CONTRACT, Vec::new())).await.unwrap();
        assert!(result.success, "{:?}", result.halt_reason);
        output_word(&result.output)
    }

    #[tokio::test]
    async fn test_reverting_callee_keeps_value_with_parent() {
        assert_eq!(callee_balance_after_payment(&REVERTS).await, U256::zero());
    }

    #[tokio::test]
    async fn test_accepting_callee_receives_value() {
        assert_eq!(callee_balance_after_payment(&ACCEPTS).await, U256::from(5));
    }
}
