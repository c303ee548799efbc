//! # Precompile ABI Codec
//!
//! Every registered selector decodes what a Solidity caller encodes, and
//! every declared output type decodes back to the run result it encoded.

#[cfg(test)]
mod tests {
    use super::super::fixtures::addr;
    use mirror_evm::domain::value_objects::U256;
    use mirror_evm::precompile::abi::{encode_call, Token};
    use mirror_evm::precompile::codec::{
        self, ApproveParams, BurnResult, GetApprovedResult, MintResult, OutputKind, RunResult,
        TokenCreateResult, WipeResult,
    };
    use mirror_evm::precompile::TokenFunction;

    fn approve_params(is_fungible: bool) -> ApproveParams {
        ApproveParams {
            token: addr(2001),
            sender: addr(1001),
            owner: addr(1001),
            is_fungible,
        }
    }

    #[test]
    fn test_every_service_selector_is_distinct() {
        let mut selectors: Vec<_> = TokenFunction::TOKEN_SERVICE
            .iter()
            .map(|f| f.selector())
            .collect();
        selectors.sort_unstable();
        selectors.dedup();
        assert_eq!(selectors.len(), TokenFunction::TOKEN_SERVICE.len());
    }

    #[test]
    fn test_relation_inputs_roundtrip() {
        for (function, multiple) in [
            (TokenFunction::AssociateToken, false),
            (TokenFunction::DissociateToken, false),
            (TokenFunction::AssociateTokens, true),
            (TokenFunction::DissociateTokens, true),
        ] {
            let second = if multiple {
                Token::Array(vec![Token::Address(addr(2001)), Token::Address(addr(2002))])
            } else {
                Token::Address(addr(2001))
            };
            let input = encode_call(function.selector(), &[Token::Address(addr(1001)), second]);
            let body = codec::decode_relations(function.selector(), &input, multiple).unwrap();
            assert_eq!(body.account, addr(1001));
            let expected = if multiple {
                vec![addr(2001), addr(2002)]
            } else {
                vec![addr(2001)]
            };
            assert_eq!(body.tokens, expected, "{}", function.name());
        }
    }

    #[test]
    fn test_supply_inputs_roundtrip() {
        let mint = TokenFunction::MintToken.selector();
        let input = encode_call(
            mint,
            &[
                Token::Address(addr(2003)),
                Token::Uint(U256::zero()),
                Token::Array(vec![Token::Bytes(b"a".to_vec()), Token::Bytes(b"bc".to_vec())]),
            ],
        );
        let body = codec::decode_mint(mint, &input).unwrap();
        assert_eq!(body.token, addr(2003));
        assert_eq!(body.metadata.len(), 2);
        assert_eq!(body.metadata[1].as_slice(), b"bc");

        let burn = TokenFunction::BurnToken.selector();
        let input = encode_call(
            burn,
            &[
                Token::Address(addr(2001)),
                Token::Uint(U256::from(40)),
                Token::Array(Vec::new()),
            ],
        );
        let body = codec::decode_burn(burn, &input).unwrap();
        assert_eq!((body.token, body.amount), (addr(2001), 40));
        assert!(body.serials.is_empty());

        let wipe = TokenFunction::WipeTokenAccount.selector();
        let input = encode_call(
            wipe,
            &[
                Token::Address(addr(2001)),
                Token::Address(addr(1001)),
                Token::Uint(U256::from(7)),
            ],
        );
        let body = codec::decode_wipe(wipe, &input).unwrap();
        assert_eq!((body.token, body.account, body.amount), (addr(2001), addr(1001), 7));

        let wipe_nft = TokenFunction::WipeTokenAccountNft.selector();
        let input = encode_call(
            wipe_nft,
            &[
                Token::Address(addr(2003)),
                Token::Address(addr(1001)),
                Token::Array(vec![Token::Int(1), Token::Int(3)]),
            ],
        );
        let body = codec::decode_wipe_nft(wipe_nft, &input).unwrap();
        assert_eq!(body.serials, vec![1, 3]);
    }

    #[test]
    fn test_transfer_inputs_roundtrip() {
        let single = TokenFunction::TransferToken.selector();
        let input = encode_call(
            single,
            &[
                Token::Address(addr(2001)),
                Token::Address(addr(1001)),
                Token::Address(addr(1002)),
                Token::Int(25),
            ],
        );
        let wrapper = codec::decode_transfer(single, &input, false).unwrap();
        let legs = &wrapper.token_transfers[0].transfers;
        assert_eq!(legs[0].account, addr(1001));
        assert_eq!(legs[0].amount, -25);
        assert_eq!(legs[1].amount, 25);

        let list = TokenFunction::TransferTokens.selector();
        let input = encode_call(
            list,
            &[
                Token::Address(addr(2001)),
                Token::Array(vec![Token::Address(addr(1001)), Token::Address(addr(1002))]),
                Token::Array(vec![Token::Int(-5), Token::Int(5)]),
            ],
        );
        let wrapper = codec::decode_transfer_tokens(list, &input).unwrap();
        let amounts: Vec<i64> = wrapper.token_transfers[0]
            .transfers
            .iter()
            .map(|leg| leg.amount)
            .collect();
        assert_eq!(amounts, vec![-5, 5]);
    }

    #[test]
    fn test_allowance_and_create_inputs_roundtrip() {
        let approve = TokenFunction::Approve.selector();
        let input = encode_call(
            approve,
            &[
                Token::Address(addr(2001)),
                Token::Address(addr(1002)),
                Token::Uint(U256::from(300)),
            ],
        );
        let body = codec::decode_approve(approve, &input, &approve_params(true), false).unwrap();
        assert_eq!(body.token_allowances[0].spender, addr(1002));
        assert_eq!(body.token_allowances[0].amount, 300);

        let approve_nft = TokenFunction::ApproveNft.selector();
        let input = encode_call(
            approve_nft,
            &[
                Token::Address(addr(2003)),
                Token::Address(addr(1002)),
                Token::Uint(U256::from(1)),
            ],
        );
        let body =
            codec::decode_approve(approve_nft, &input, &approve_params(false), false).unwrap();
        assert_eq!(body.nft_allowances[0].serials, vec![1]);

        let get_approved = TokenFunction::GetApproved.selector();
        let input = encode_call(
            get_approved,
            &[Token::Address(addr(2003)), Token::Uint(U256::from(9))],
        );
        let info = codec::decode_get_approved(get_approved, &input, None).unwrap();
        assert_eq!((info.token, info.serial), (addr(2003), U256::from(9)));

        let create = TokenFunction::CreateFungibleToken.selector();
        let input = encode_call(
            create,
            &[
                Token::String("Mirror".into()),
                Token::String("MIR".into()),
                Token::Address(addr(1001)),
                Token::Uint(U256::from(1_000)),
                Token::Uint(U256::from(2)),
            ],
        );
        let body = codec::decode_create_fungible(create, &input).unwrap();
        assert_eq!(body.name, "Mirror");
        assert_eq!(body.symbol, "MIR");
        assert_eq!(body.treasury, addr(1001));
        assert_eq!((body.initial_supply, body.decimals), (1_000, 2));
    }

    #[test]
    fn test_every_output_kind_roundtrips() {
        let cases = [
            (OutputKind::Status, RunResult::Status),
            (
                OutputKind::Mint,
                RunResult::Mint(MintResult {
                    total_supply: 3,
                    serials: vec![2, 3],
                }),
            ),
            (
                OutputKind::Burn,
                RunResult::Burn(BurnResult {
                    total_supply: 60,
                    serials: Vec::new(),
                }),
            ),
            (OutputKind::Approve, RunResult::Approve { approved: true }),
            (
                OutputKind::GetApproved,
                RunResult::GetApproved(GetApprovedResult { spender: addr(1002) }),
            ),
            (
                OutputKind::Create,
                RunResult::Create(TokenCreateResult { token: addr(5000) }),
            ),
            (OutputKind::ErcBool, RunResult::Approve { approved: false }),
            (
                OutputKind::ErcAddress,
                RunResult::GetApproved(GetApprovedResult { spender: addr(1001) }),
            ),
        ];
        for (kind, result) in cases {
            let encoded = codec::encode_output(kind, &result);
            assert_eq!(
                codec::decode_output(kind, encoded.as_slice()).unwrap(),
                result,
                "{kind:?}"
            );
        }
    }

    #[test]
    fn test_wipe_output_shares_status_shape() {
        let wipe = RunResult::Wipe(WipeResult {
            total_supply: 10,
            serials: Vec::new(),
        });
        let encoded = codec::encode_output(TokenFunction::WipeTokenAccount.output(), &wipe);
        assert_eq!(
            codec::decode_output(OutputKind::Status, encoded.as_slice()).unwrap(),
            RunResult::Status
        );
    }
}
