//! # Token Service Calls From Bytecode
//!
//! A contract forwards its calldata to the token service and returns the
//! call's success flag. Batches apply atomically: one failing token fails
//! the whole call.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fixtures::*;
    use mirror_evm::adapters::InMemorySnapshot;
    use mirror_evm::config::EvmProperties;
    use mirror_evm::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
    use mirror_evm::domain::value_objects::{Address, StorageKey, StorageValue, U256};
    use mirror_evm::errors::{ExceptionalHaltReason, StateError, VmError};
    use mirror_evm::ports::inbound::{CallRequest, SimulationApi};
    use mirror_evm::ports::outbound::SnapshotProvider;
    use mirror_evm::precompile::abi::{encode_call, Token};
    use mirror_evm::precompile::TokenFunction;

    /// Copy calldata to memory, CALL 0x167 with it, return the success flag.
    const FORWARD: [u8; 28] = [
        0x36, 0x60, 0x00, 0x60, 0x00, 0x37, 0x60, 0x20, 0x60, 0x00, 0x36, 0x60, 0x00, 0x60, 0x00,
        0x61, 0x01, 0x67, 0x5a, 0xf1, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];
    /// As `FORWARD`, through STATICCALL.
    const FORWARD_STATIC: [u8; 26] = [
        0x36, 0x60, 0x00, 0x60, 0x00, 0x37, 0x60, 0x20, 0x60, 0x00, 0x36, 0x60, 0x00, 0x61, 0x01,
        0x67, 0x5a, 0xfa, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
    ];

    fn forwarder(code: &[u8]) -> Account {
        Account {
            num_associations: 1,
            ..contract(CONTRACT, code)
        }
    }

    fn associate_tokens(tokens: &[u64]) -> Vec<u8> {
        encode_call(
            TokenFunction::AssociateTokens.selector(),
            &[
                Token::Address(addr(CONTRACT)),
                Token::Array(tokens.iter().map(|t| Token::Address(addr(*t))).collect()),
            ],
        )
    }

    fn request(data: Vec<u8>) -> CallRequest {
        call_to(CONTRACT, data).with_gas_limit(5_000_000)
    }

    async fn forwarded_flag(code: &[u8], data: Vec<u8>) -> U256 {
        let service = service(with_tokens(snapshot_with(vec![forwarder(code)])));
        let result = service.call(request(data)).await.unwrap();
        assert!(result.success, "{:?}", result.halt_reason);
        output_word(&result.output)
    }

    #[tokio::test]
    async fn test_batch_with_one_associated_token_fails_whole_call() {
        let flag = forwarded_flag(&FORWARD, associate_tokens(&[TOKEN_A, TOKEN_B])).await;
        assert_eq!(flag, U256::zero());
    }

    #[tokio::test]
    async fn test_batch_of_fresh_tokens_succeeds() {
        let flag = forwarded_flag(&FORWARD, associate_tokens(&[TOKEN_A, UNIQUE])).await;
        assert_eq!(flag, U256::one());
    }

    #[tokio::test]
    async fn test_dissociate_existing_relationship() {
        let data = encode_call(
            TokenFunction::DissociateToken.selector(),
            &[Token::Address(addr(CONTRACT)), Token::Address(addr(TOKEN_B))],
        );
        assert_eq!(forwarded_flag(&FORWARD, data).await, U256::one());
    }

    #[tokio::test]
    async fn test_static_call_cannot_write() {
        let flag = forwarded_flag(&FORWARD_STATIC, associate_tokens(&[TOKEN_A])).await;
        assert_eq!(flag, U256::zero());
    }

    #[tokio::test]
    async fn test_static_call_serves_views() {
        let data = encode_call(
            TokenFunction::GetApproved.selector(),
            &[Token::Address(addr(UNIQUE)), Token::Uint(U256::one())],
        );
        assert_eq!(forwarded_flag(&FORWARD_STATIC, data).await, U256::one());
    }

    /// The fixture ledger, except that reading `TOKEN_A` fails.
    struct BrokenToken(InMemorySnapshot);

    impl SnapshotProvider for BrokenToken {
        fn account(&self, address: &Address) -> Result<Option<Account>, StateError> {
            self.0.account(address)
        }

        fn storage(&self, address: &Address, key: &StorageKey) -> Result<StorageValue, StateError> {
            self.0.storage(address, key)
        }

        fn token(&self, address: &Address) -> Result<Option<TokenInfo>, StateError> {
            if *address == addr(TOKEN_A) {
                return Err(StateError::Snapshot("db down".into()));
            }
            self.0.token(address)
        }

        fn relationship(
            &self,
            account: &Address,
            token: &Address,
        ) -> Result<Option<TokenRelationship>, StateError> {
            self.0.relationship(account, token)
        }

        fn nft(&self, token: &Address, serial: i64) -> Result<Option<Nft>, StateError> {
            self.0.nft(token, serial)
        }

        fn allowance(
            &self,
            owner: &Address,
            token: &Address,
            spender: &Address,
        ) -> Result<u64, StateError> {
            self.0.allowance(owner, token, spender)
        }
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts_whole_call() {
        let snapshot = BrokenToken(with_tokens(snapshot_with(vec![forwarder(&FORWARD)])));
        let service = service_over(Arc::new(snapshot), EvmProperties::default());
        let err = service
            .call(request(associate_tokens(&[TOKEN_A])))
            .await
            .unwrap_err();
        assert!(matches!(err, VmError::StateError(StateError::Snapshot(_))), "{err:?}");
        assert!(err.is_abort());
    }

    #[tokio::test]
    async fn test_unknown_token_fails_forwarded_call() {
        let flag = forwarded_flag(&FORWARD, associate_tokens(&[7777])).await;
        assert_eq!(flag, U256::zero());
    }

    #[tokio::test]
    async fn test_unknown_token_halts_direct_call_with_missing_entity() {
        let service = service(with_tokens(snapshot_with(vec![forwarder(&FORWARD)])));
        let direct = CallRequest::new(
            addr(SENDER),
            Some(addr(0x167)),
            associate_tokens(&[7777]).into(),
            block_at(1),
        )
        .with_gas_limit(5_000_000);
        let result = service.call(direct).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.halt_reason, Some(ExceptionalHaltReason::MissingEntity));
    }

    #[tokio::test]
    async fn test_unknown_selector_reverts_child_only() {
        let flag = forwarded_flag(&FORWARD, vec![0xde, 0xad, 0xbe, 0xef]).await;
        assert_eq!(flag, U256::zero());
    }
}
