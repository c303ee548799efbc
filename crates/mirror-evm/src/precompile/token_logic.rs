//! # Token Logic
//!
//! Ledger rules behind the token precompiles. Every function validates
//! before it writes, so a rejected operation leaves the updater untouched
//! apart from what an earlier item of the same batch wrote; the dispatcher
//! runs each call in its own child frame and reverts it on failure.
//!
//! An account or token id with nothing behind it is `MissingEntity`; every
//! other rejection is a `Failed` status code.

use super::codec::{
    ApproveDecodedNftInfo, BurnResult, GetApprovedResult, MintResult, TokenCreateResult,
    WipeResult,
};
use crate::domain::entities::{Account, Nft, TokenInfo, TokenRelationship};
use crate::domain::transactions::{
    ApproveAllowanceBody, CryptoTransferBody, NftTransfer, TokenBurnBody, TokenCreateBody,
    TokenMintBody, TokenRelationsBody, TokenWipeBody,
};
use crate::domain::value_objects::{Address, U256};
use crate::errors::{PrecompileError, ResponseCode};
use crate::state::{StackedUpdater, WorldView};
use std::collections::HashSet;

fn ensure(condition: bool, code: ResponseCode) -> Result<(), PrecompileError> {
    if condition {
        Ok(())
    } else {
        Err(PrecompileError::Failed(code))
    }
}

fn fail<T>(code: ResponseCode) -> Result<T, PrecompileError> {
    Err(PrecompileError::Failed(code))
}

// =============================================================================
// LOOKUPS
// =============================================================================

/// Token metadata; an id with no token behind it is `MissingEntity`.
fn known_token(view: &dyn WorldView, address: &Address) -> Result<TokenInfo, PrecompileError> {
    view.token(address)?
        .ok_or_else(|| PrecompileError::MissingEntity(format!("token {address}")))
}

fn live_token(view: &dyn WorldView, address: &Address) -> Result<TokenInfo, PrecompileError> {
    let token = known_token(view, address)?;
    ensure(!token.deleted, ResponseCode::TokenWasDeleted)?;
    ensure(!token.paused, ResponseCode::TokenIsPaused)?;
    Ok(token)
}

fn ensure_account(
    view: &dyn WorldView,
    address: &Address,
    code: ResponseCode,
) -> Result<(), PrecompileError> {
    let real = view.get(address)?.is_some_and(|account| !account.is_token());
    ensure(real, code)
}

/// The account an operation acts on. Unlike counterparties, an absent
/// subject is `MissingEntity` rather than a status code.
fn subject_account(view: &dyn WorldView, address: &Address) -> Result<(), PrecompileError> {
    match view.get(address)? {
        Some(account) => ensure(!account.is_token(), ResponseCode::InvalidAccountId),
        None => Err(PrecompileError::MissingEntity(format!("account {address}"))),
    }
}

fn relationship(
    view: &dyn WorldView,
    account: &Address,
    token: &Address,
) -> Result<TokenRelationship, PrecompileError> {
    match view.relationship(account, token)? {
        Some(rel) => Ok(rel),
        None => fail(ResponseCode::TokenNotAssociatedToAccount),
    }
}

/// Applies per-account counter deltas; accounts outside the EVM view
/// (for example deleted ones) are left alone.
fn adjust_counters(
    updater: &mut StackedUpdater<'_>,
    account: &Address,
    adjust: impl FnOnce(&mut Account),
) -> Result<(), PrecompileError> {
    if let Some(account) = updater.get_for_mutation(account)? {
        adjust(account);
    }
    Ok(())
}

/// Writes a relationship balance and keeps `num_positive_balances` in step.
fn set_balance(
    updater: &mut StackedUpdater<'_>,
    mut rel: TokenRelationship,
    balance: u64,
) -> Result<(), PrecompileError> {
    let was_positive = rel.balance > 0;
    let is_positive = balance > 0;
    rel.balance = balance;
    let (account, token) = (rel.account, rel.token);
    updater.put_relationship(account, token, Some(rel));
    if was_positive != is_positive {
        adjust_counters(updater, &account, |a| {
            if is_positive {
                a.num_positive_balances += 1;
            } else {
                a.num_positive_balances = a.num_positive_balances.saturating_sub(1);
            }
        })?;
    }
    Ok(())
}

fn checked_delta(balance: u64, delta: i64, insufficient: ResponseCode) -> Result<u64, PrecompileError> {
    let updated = if delta >= 0 {
        balance.checked_add(delta.unsigned_abs())
    } else {
        balance.checked_sub(delta.unsigned_abs())
    };
    updated.ok_or(PrecompileError::Failed(insufficient))
}

// =============================================================================
// ASSOCIATE / DISSOCIATE
// =============================================================================

fn validate_token_list(body: &TokenRelationsBody) -> Result<(), PrecompileError> {
    ensure(!body.account.is_zero(), ResponseCode::InvalidAccountId)?;
    ensure(!body.tokens.is_empty(), ResponseCode::EmptyTokenList)?;
    let unique: HashSet<_> = body.tokens.iter().collect();
    ensure(
        unique.len() == body.tokens.len(),
        ResponseCode::TokenIdRepeatedInTokenList,
    )
}

/// Associates every listed token with the account.
///
/// # Errors
///
/// `MissingEntity` for an unknown account or token, otherwise `Failed`
/// with the first violated rule; nothing is written in either case.
pub fn associate(
    updater: &mut StackedUpdater<'_>,
    body: &TokenRelationsBody,
) -> Result<(), PrecompileError> {
    validate_token_list(body)?;
    subject_account(updater, &body.account)?;

    let mut created = Vec::with_capacity(body.tokens.len());
    for address in &body.tokens {
        let token = known_token(updater, address)?;
        ensure(!token.deleted, ResponseCode::TokenWasDeleted)?;
        ensure(
            updater.relationship(&body.account, address)?.is_none(),
            ResponseCode::TokenAlreadyAssociatedToAccount,
        )?;
        created.push(TokenRelationship {
            account: body.account,
            token: *address,
            balance: 0,
            frozen: token.freeze_default,
            kyc_granted: true,
        });
    }

    let count = created.len() as u32;
    for rel in created {
        updater.put_relationship(rel.account, rel.token, Some(rel));
    }
    adjust_counters(updater, &body.account, |a| a.num_associations += count)
}

/// Removes every listed token relationship from the account. Each token
/// is looked up before its relationship.
///
/// # Errors
///
/// `MissingEntity` for an unknown account or token, otherwise `Failed`
/// with the first violated rule; nothing is written in either case.
pub fn dissociate(
    updater: &mut StackedUpdater<'_>,
    body: &TokenRelationsBody,
) -> Result<(), PrecompileError> {
    validate_token_list(body)?;
    subject_account(updater, &body.account)?;

    for address in &body.tokens {
        let token = known_token(updater, address)?;
        let rel = relationship(updater, &body.account, address)?;
        if !token.deleted {
            ensure(token.treasury != body.account, ResponseCode::AccountIsTreasury)?;
            ensure(
                rel.balance == 0,
                ResponseCode::TransactionRequiresZeroTokenBalances,
            )?;
        }
    }

    let mut positive = 0u32;
    for address in &body.tokens {
        if let Some(rel) = updater.relationship(&body.account, address)? {
            if rel.balance > 0 {
                positive += 1;
            }
        }
        updater.put_relationship(body.account, *address, None);
    }
    let count = body.tokens.len() as u32;
    adjust_counters(updater, &body.account, |a| {
        a.num_associations = a.num_associations.saturating_sub(count);
        a.num_positive_balances = a.num_positive_balances.saturating_sub(positive);
    })
}

// =============================================================================
// SUPPLY
// =============================================================================

/// Mints fungible units or NFTs into the treasury.
///
/// # Errors
///
/// `Failed` for unusable tokens, bad amounts or an exceeded max supply.
pub fn mint(
    updater: &mut StackedUpdater<'_>,
    body: &TokenMintBody,
) -> Result<MintResult, PrecompileError> {
    let mut token = live_token(updater, &body.token)?;
    ensure(token.has_supply_key, ResponseCode::TokenHasNoSupplyKey)?;
    let treasury_rel = relationship(updater, &token.treasury, &body.token)?;

    let (minted, serials) = if token.is_nft() {
        ensure(
            body.amount == 0 && !body.metadata.is_empty(),
            ResponseCode::InvalidTokenMintAmount,
        )?;
        let last = i64::try_from(body.metadata.len())
            .ok()
            .and_then(|count| token.last_used_serial.checked_add(count))
            .ok_or(PrecompileError::Failed(ResponseCode::InvalidTokenMintAmount))?;
        let serials: Vec<i64> = (token.last_used_serial + 1..=last).collect();
        (body.metadata.len() as u64, serials)
    } else {
        ensure(
            body.amount > 0 && body.metadata.is_empty(),
            ResponseCode::InvalidTokenMintAmount,
        )?;
        (body.amount, Vec::new())
    };

    let total_supply = token
        .total_supply
        .checked_add(minted)
        .ok_or(PrecompileError::Failed(ResponseCode::InvalidTokenMintAmount))?;
    ensure(
        token.max_supply == 0 || total_supply <= token.max_supply,
        ResponseCode::TokenMaxSupplyReached,
    )?;
    let treasury_balance = checked_delta(
        treasury_rel.balance,
        minted as i64,
        ResponseCode::InvalidTokenMintAmount,
    )?;

    for (serial, metadata) in serials.iter().zip(&body.metadata) {
        updater.put_nft(
            body.token,
            *serial,
            Some(Nft {
                token: body.token,
                serial: *serial,
                owner: token.treasury,
                spender: Address::ZERO,
                metadata: metadata.clone(),
            }),
        );
    }
    if let Some(last) = serials.last() {
        token.last_used_serial = *last;
        let count = serials.len() as u64;
        adjust_counters(updater, &token.treasury, |a| a.owned_nfts += count)?;
    }
    token.total_supply = total_supply;
    updater.put_token(token);
    set_balance(updater, treasury_rel, treasury_balance)?;
    Ok(MintResult {
        total_supply,
        serials,
    })
}

fn remove_nfts(
    updater: &mut StackedUpdater<'_>,
    token: &Address,
    serials: &[i64],
    expected_owner: &Address,
    empty: ResponseCode,
) -> Result<(), PrecompileError> {
    ensure(!serials.is_empty(), empty)?;
    let unique: HashSet<_> = serials.iter().collect();
    ensure(unique.len() == serials.len(), ResponseCode::InvalidNftId)?;
    for serial in serials {
        let nft = match updater.nft(token, *serial)? {
            Some(nft) => nft,
            None => return fail(ResponseCode::InvalidNftId),
        };
        ensure(
            nft.owner == *expected_owner,
            ResponseCode::SenderDoesNotOwnNftSerialNo,
        )?;
    }
    for serial in serials {
        updater.put_nft(*token, *serial, None);
    }
    let count = serials.len() as u64;
    adjust_counters(updater, expected_owner, |a| {
        a.owned_nfts = a.owned_nfts.saturating_sub(count);
    })
}

/// Burns units or NFTs from the treasury.
///
/// # Errors
///
/// `Failed` for unusable tokens, bad amounts or serials not held by the
/// treasury.
pub fn burn(
    updater: &mut StackedUpdater<'_>,
    body: &TokenBurnBody,
) -> Result<BurnResult, PrecompileError> {
    let mut token = live_token(updater, &body.token)?;
    ensure(token.has_supply_key, ResponseCode::TokenHasNoSupplyKey)?;
    let treasury_rel = relationship(updater, &token.treasury, &body.token)?;

    let burned = if token.is_nft() {
        ensure(body.amount == 0, ResponseCode::InvalidTokenBurnAmount)?;
        body.serials.len() as u64
    } else {
        ensure(
            body.amount > 0 && body.serials.is_empty(),
            ResponseCode::InvalidTokenBurnAmount,
        )?;
        body.amount
    };
    let treasury_balance = treasury_rel
        .balance
        .checked_sub(burned)
        .ok_or(PrecompileError::Failed(ResponseCode::InsufficientTokenBalance))?;
    if token.is_nft() {
        remove_nfts(
            updater,
            &body.token,
            &body.serials,
            &token.treasury,
            ResponseCode::InvalidTokenBurnAmount,
        )?;
    }

    let total_supply = token.total_supply.saturating_sub(burned);
    token.total_supply = total_supply;
    updater.put_token(token);
    set_balance(updater, treasury_rel, treasury_balance)?;
    Ok(BurnResult {
        total_supply,
        serials: body.serials.clone(),
    })
}

/// Wipes units or NFTs from a non-treasury account.
///
/// # Errors
///
/// `Failed` for unusable tokens, a missing wipe key, the treasury as
/// target, or amounts above the account's holdings.
pub fn wipe(
    updater: &mut StackedUpdater<'_>,
    body: &TokenWipeBody,
) -> Result<WipeResult, PrecompileError> {
    let mut token = live_token(updater, &body.token)?;
    ensure(token.has_wipe_key, ResponseCode::TokenHasNoWipeKey)?;
    subject_account(updater, &body.account)?;
    ensure(
        token.treasury != body.account,
        ResponseCode::CannotWipeTokenTreasuryAccount,
    )?;
    let rel = relationship(updater, &body.account, &body.token)?;

    let wiped = if token.is_nft() {
        body.serials.len() as u64
    } else {
        ensure(
            body.amount > 0 && body.serials.is_empty(),
            ResponseCode::InvalidWipingAmount,
        )?;
        body.amount
    };
    let balance = rel
        .balance
        .checked_sub(wiped)
        .ok_or(PrecompileError::Failed(ResponseCode::InvalidWipingAmount))?;
    if token.is_nft() {
        remove_nfts(
            updater,
            &body.token,
            &body.serials,
            &body.account,
            ResponseCode::InvalidWipingAmount,
        )?;
    }

    let total_supply = token.total_supply.saturating_sub(wiped);
    token.total_supply = total_supply;
    updater.put_token(token);
    set_balance(updater, rel, balance)?;
    Ok(WipeResult {
        total_supply,
        serials: body.serials.clone(),
    })
}

// =============================================================================
// TRANSFERS
// =============================================================================

fn transfer_hbar(
    updater: &mut StackedUpdater<'_>,
    body: &CryptoTransferBody,
) -> Result<(), PrecompileError> {
    if body.hbar_transfers.is_empty() {
        return Ok(());
    }
    let net: i128 = body.hbar_transfers.iter().map(|leg| i128::from(leg.amount)).sum();
    ensure(net == 0, ResponseCode::InvalidTransactionBody)?;
    for leg in &body.hbar_transfers {
        let balance = updater.balance(&leg.account)?;
        ensure_account(updater, &leg.account, ResponseCode::InvalidAccountId)?;
        if leg.amount < 0 {
            ensure(
                balance >= U256::from(leg.amount.unsigned_abs()),
                ResponseCode::InsufficientAccountBalance,
            )?;
        }
    }
    for leg in &body.hbar_transfers {
        if let Some(account) = updater.get_for_mutation(&leg.account)? {
            let amount = U256::from(leg.amount.unsigned_abs());
            account.balance = if leg.amount < 0 {
                account.balance.saturating_sub(amount)
            } else {
                account.balance.saturating_add(amount)
            };
        }
    }
    Ok(())
}

fn move_nft(
    updater: &mut StackedUpdater<'_>,
    token: &Address,
    leg: &NftTransfer,
    spender: &Address,
) -> Result<(), PrecompileError> {
    let mut nft = match updater.nft(token, leg.serial)? {
        Some(nft) => nft,
        None => return fail(ResponseCode::InvalidNftId),
    };
    ensure(nft.owner == leg.sender, ResponseCode::SenderDoesNotOwnNftSerialNo)?;
    if leg.is_approval {
        ensure(nft.spender == *spender, ResponseCode::SpenderDoesNotHaveAllowance)?;
    }
    ensure_account(updater, &leg.receiver, ResponseCode::InvalidAccountId)?;
    let from = relationship(updater, &leg.sender, token)?;
    let to = relationship(updater, &leg.receiver, token)?;
    ensure(!from.frozen && !to.frozen, ResponseCode::AccountFrozenForToken)?;

    let from_balance = checked_delta(from.balance, -1, ResponseCode::InsufficientTokenBalance)?;
    let to_balance = checked_delta(to.balance, 1, ResponseCode::InvalidTransactionBody)?;
    set_balance(updater, from, from_balance)?;
    set_balance(updater, to, to_balance)?;

    nft.owner = leg.receiver;
    nft.spender = Address::ZERO;
    updater.put_nft(*token, leg.serial, Some(nft));
    adjust_counters(updater, &leg.sender, |a| a.owned_nfts = a.owned_nfts.saturating_sub(1))?;
    adjust_counters(updater, &leg.receiver, |a| a.owned_nfts += 1)
}

/// Applies a crypto transfer. `spender` is the caller acting on approval
/// legs.
///
/// # Errors
///
/// `Failed` for unbalanced legs, unassociated or frozen accounts, short
/// balances and missing allowances.
pub fn transfer(
    updater: &mut StackedUpdater<'_>,
    body: &CryptoTransferBody,
    spender: &Address,
) -> Result<(), PrecompileError> {
    transfer_hbar(updater, body)?;

    for list in &body.token_transfers {
        let token = live_token(updater, &list.token)?;
        if !list.transfers.is_empty() {
            ensure(!token.is_nft(), ResponseCode::InvalidTransactionBody)?;
            let net: i128 = list.transfers.iter().map(|leg| i128::from(leg.amount)).sum();
            ensure(net == 0, ResponseCode::InvalidTransactionBody)?;
        }

        for leg in &list.transfers {
            let rel = relationship(updater, &leg.account, &list.token)?;
            ensure(!rel.frozen, ResponseCode::AccountFrozenForToken)?;
            ensure(rel.kyc_granted, ResponseCode::AccountKycNotGrantedForToken)?;
            if leg.is_approval && leg.amount < 0 {
                let debit = leg.amount.unsigned_abs();
                let allowance = updater.allowance(&leg.account, &list.token, spender)?;
                ensure(allowance > 0, ResponseCode::SpenderDoesNotHaveAllowance)?;
                ensure(debit <= allowance, ResponseCode::AmountExceedsAllowance)?;
                updater.set_allowance(leg.account, list.token, *spender, allowance - debit);
            }
            let balance = checked_delta(rel.balance, leg.amount, ResponseCode::InsufficientTokenBalance)?;
            set_balance(updater, rel, balance)?;
        }

        for leg in &list.nft_transfers {
            ensure(token.is_nft(), ResponseCode::InvalidTransactionBody)?;
            move_nft(updater, &list.token, leg, spender)?;
        }
    }
    Ok(())
}

// =============================================================================
// ALLOWANCES
// =============================================================================

/// Grants fungible allowances and NFT approvals.
///
/// # Errors
///
/// `Failed` for unknown owners, spenders, tokens or serials.
pub fn approve(
    updater: &mut StackedUpdater<'_>,
    body: &ApproveAllowanceBody,
) -> Result<(), PrecompileError> {
    for allowance in &body.token_allowances {
        ensure_account(updater, &allowance.owner, ResponseCode::InvalidAllowanceOwnerId)?;
        ensure_account(updater, &allowance.spender, ResponseCode::InvalidAllowanceSpenderId)?;
        let token = live_token(updater, &allowance.token)?;
        ensure(!token.is_nft(), ResponseCode::InvalidTokenId)?;
        relationship(updater, &allowance.owner, &allowance.token)?;
        updater.set_allowance(
            allowance.owner,
            allowance.token,
            allowance.spender,
            allowance.amount,
        );
    }

    for approval in &body.nft_allowances {
        ensure_account(updater, &approval.owner, ResponseCode::InvalidAllowanceOwnerId)?;
        if !approval.spender.is_zero() {
            ensure_account(updater, &approval.spender, ResponseCode::InvalidAllowanceSpenderId)?;
        }
        let token = live_token(updater, &approval.token)?;
        ensure(token.is_nft(), ResponseCode::InvalidTokenId)?;
        for serial in &approval.serials {
            let mut nft = match updater.nft(&approval.token, *serial)? {
                Some(nft) => nft,
                None => return fail(ResponseCode::InvalidNftId),
            };
            ensure(nft.owner == approval.owner, ResponseCode::SenderDoesNotOwnNftSerialNo)?;
            nft.spender = approval.spender;
            updater.put_nft(approval.token, *serial, Some(nft));
        }
    }
    Ok(())
}

/// Approved spender of an NFT. Reads only.
///
/// # Errors
///
/// `MissingEntity` for an unknown token, `Failed` for unknown serials.
pub fn get_approved(
    view: &dyn WorldView,
    info: &ApproveDecodedNftInfo,
) -> Result<GetApprovedResult, PrecompileError> {
    let token = known_token(view, &info.token)?;
    ensure(token.is_nft(), ResponseCode::InvalidTokenId)?;
    ensure(info.serial <= U256::from(i64::MAX as u64), ResponseCode::InvalidNftId)?;
    match view.nft(&info.token, info.serial.as_u64() as i64)? {
        Some(nft) => Ok(GetApprovedResult {
            spender: nft.spender,
        }),
        None => fail(ResponseCode::InvalidNftId),
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Creates a fungible token with its treasury already associated and
/// holding the initial supply.
///
/// # Errors
///
/// `Failed` for an unknown treasury; `MissingEntity`-class errors when no
/// address can be allocated.
pub fn create_fungible(
    updater: &mut StackedUpdater<'_>,
    body: &TokenCreateBody,
    sponsor: &Address,
) -> Result<TokenCreateResult, PrecompileError> {
    ensure_account(updater, &body.treasury, ResponseCode::InvalidTreasuryAccountForToken)?;
    ensure(!body.name.is_empty() && !body.symbol.is_empty(), ResponseCode::InvalidTransactionBody)?;

    let address = updater.new_contract_address(sponsor)?;
    updater.put_token(TokenInfo {
        address,
        token_type: body.token_type,
        treasury: body.treasury,
        total_supply: body.initial_supply,
        decimals: body.decimals,
        name: body.name.clone(),
        symbol: body.symbol.clone(),
        has_supply_key: body.supply_key,
        ..TokenInfo::default()
    });
    updater.put_relationship(
        body.treasury,
        address,
        Some(TokenRelationship {
            account: body.treasury,
            token: address,
            balance: body.initial_supply,
            frozen: false,
            kyc_granted: true,
        }),
    );
    let funded = body.initial_supply > 0;
    adjust_counters(updater, &body.treasury, |a| {
        a.num_treasury_titles += 1;
        a.num_associations += 1;
        if funded {
            a.num_positive_balances += 1;
        }
    })?;
    Ok(TokenCreateResult { token: address })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemorySnapshot;
    use crate::domain::entities::TokenType;
    use crate::domain::transactions::{AccountAmount, NftAllowance, TokenAllowance, TokenTransferList};
    use crate::domain::value_objects::{Bytes, Timestamp};
    use crate::errors::{ExceptionalHaltReason, VmError};
    use crate::state::{SimulatedSequencer, WorldStateView};
    use std::sync::Arc;

    const TREASURY: u64 = 1001;
    const HOLDER: u64 = 1002;
    const SPENDER: u64 = 1003;
    const FUNGIBLE: u64 = 2001;
    const UNIQUE: u64 = 2002;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn rel(account: u64, token: u64, balance: u64) -> TokenRelationship {
        TokenRelationship {
            account: addr(account),
            token: addr(token),
            balance,
            frozen: false,
            kyc_granted: true,
        }
    }

    fn world() -> WorldStateView {
        let mut treasury = Account::new_eoa(addr(TREASURY), U256::from(1_000));
        treasury.num_treasury_titles = 2;
        treasury.num_associations = 2;
        treasury.num_positive_balances = 2;
        treasury.owned_nfts = 1;
        let mut holder = Account::new_eoa(addr(HOLDER), U256::from(50));
        holder.num_associations = 1;

        let snapshot = InMemorySnapshot::new()
            .with_account(treasury)
            .with_account(holder)
            .with_account(Account::new_eoa(addr(SPENDER), U256::zero()))
            .with_token(TokenInfo {
                address: addr(FUNGIBLE),
                treasury: addr(TREASURY),
                total_supply: 100,
                max_supply: 150,
                has_supply_key: true,
                has_wipe_key: true,
                ..TokenInfo::default()
            })
            .with_token(TokenInfo {
                address: addr(UNIQUE),
                token_type: TokenType::NonFungibleUnique,
                treasury: addr(TREASURY),
                total_supply: 1,
                has_supply_key: true,
                last_used_serial: 1,
                ..TokenInfo::default()
            })
            .with_relationship(rel(TREASURY, FUNGIBLE, 100))
            .with_relationship(rel(TREASURY, UNIQUE, 1))
            .with_relationship(rel(HOLDER, FUNGIBLE, 0))
            .with_nft(Nft {
                token: addr(UNIQUE),
                serial: 1,
                owner: addr(TREASURY),
                spender: Address::ZERO,
                metadata: Bytes::from_slice(b"one"),
            });
        WorldStateView::new(
            Arc::new(snapshot),
            Arc::new(SimulatedSequencer::new(5_000)),
            true,
            Timestamp::from_seconds(1),
        )
    }

    fn failed(code: ResponseCode) -> PrecompileError {
        PrecompileError::Failed(code)
    }

    #[test]
    fn test_associate_batch_is_all_or_nothing() {
        let view = world();
        let mut updater = view.updater();
        let body = TokenRelationsBody {
            account: addr(HOLDER),
            tokens: vec![addr(UNIQUE), addr(FUNGIBLE)],
        };
        assert_eq!(
            associate(&mut updater, &body),
            Err(failed(ResponseCode::TokenAlreadyAssociatedToAccount))
        );
        assert!(updater.relationship(&addr(HOLDER), &addr(UNIQUE)).unwrap().is_none());
        assert!(updater.journal().is_empty());
    }

    #[test]
    fn test_associate_updates_counters() {
        let view = world();
        let mut updater = view.updater();
        let body = TokenRelationsBody {
            account: addr(SPENDER),
            tokens: vec![addr(FUNGIBLE), addr(UNIQUE)],
        };
        associate(&mut updater, &body).unwrap();
        assert!(updater.relationship(&addr(SPENDER), &addr(UNIQUE)).unwrap().is_some());
        assert_eq!(updater.get(&addr(SPENDER)).unwrap().unwrap().num_associations, 2);
    }

    #[test]
    fn test_associate_syntax_checks() {
        let view = world();
        let mut updater = view.updater();
        let empty = TokenRelationsBody {
            account: addr(HOLDER),
            tokens: vec![],
        };
        let repeated = TokenRelationsBody {
            account: addr(SPENDER),
            tokens: vec![addr(UNIQUE), addr(UNIQUE)],
        };
        let unknown = TokenRelationsBody {
            account: addr(SPENDER),
            tokens: vec![addr(9999)],
        };
        assert_eq!(associate(&mut updater, &empty), Err(failed(ResponseCode::EmptyTokenList)));
        assert_eq!(
            associate(&mut updater, &repeated),
            Err(failed(ResponseCode::TokenIdRepeatedInTokenList))
        );
        assert!(matches!(
            associate(&mut updater, &unknown),
            Err(PrecompileError::MissingEntity(_))
        ));
    }

    fn relations(account: u64, tokens: &[u64]) -> TokenRelationsBody {
        TokenRelationsBody {
            account: addr(account),
            tokens: tokens.iter().map(|t| addr(*t)).collect(),
        }
    }

    #[test]
    fn test_unknown_ids_are_missing_entities() {
        let view = world();
        let mut updater = view.updater();
        let cases = [
            associate(&mut updater, &relations(TREASURY, &[7777])),
            associate(&mut updater, &relations(8888, &[FUNGIBLE])),
            dissociate(&mut updater, &relations(8888, &[FUNGIBLE])),
            wipe(
                &mut updater,
                &TokenWipeBody {
                    token: addr(FUNGIBLE),
                    account: addr(8888),
                    amount: 1,
                    serials: vec![],
                },
            )
            .map(|_| ()),
        ];
        for result in cases {
            let err = result.unwrap_err();
            assert!(matches!(err, PrecompileError::MissingEntity(_)), "{err:?}");
            assert_eq!(
                VmError::from(err).halt_reason(),
                Some(ExceptionalHaltReason::MissingEntity)
            );
        }
        assert!(updater.journal().is_empty());
    }

    #[test]
    fn test_token_as_subject_account_is_invalid() {
        let view = world();
        let mut updater = view.updater();
        assert_eq!(
            associate(&mut updater, &relations(FUNGIBLE, &[UNIQUE])),
            Err(failed(ResponseCode::InvalidAccountId))
        );
    }

    #[test]
    fn test_dissociate_checks_token_before_relationship() {
        let view = world();
        let mut updater = view.updater();
        assert_eq!(
            dissociate(&mut updater, &relations(HOLDER, &[7777])),
            Err(PrecompileError::MissingEntity(format!("token {}", addr(7777))))
        );
        // The known token in front of the unknown one is not removed.
        assert!(matches!(
            dissociate(&mut updater, &relations(HOLDER, &[FUNGIBLE, 7777])),
            Err(PrecompileError::MissingEntity(_))
        ));
        assert!(updater.relationship(&addr(HOLDER), &addr(FUNGIBLE)).unwrap().is_some());
        assert!(updater.journal().is_empty());
    }

    #[test]
    fn test_dissociate_rules() {
        let view = world();
        let mut updater = view.updater();
        let treasury = TokenRelationsBody {
            account: addr(TREASURY),
            tokens: vec![addr(FUNGIBLE)],
        };
        let unassociated = TokenRelationsBody {
            account: addr(HOLDER),
            tokens: vec![addr(UNIQUE)],
        };
        let ok = TokenRelationsBody {
            account: addr(HOLDER),
            tokens: vec![addr(FUNGIBLE)],
        };
        assert_eq!(dissociate(&mut updater, &treasury), Err(failed(ResponseCode::AccountIsTreasury)));
        assert_eq!(
            dissociate(&mut updater, &unassociated),
            Err(failed(ResponseCode::TokenNotAssociatedToAccount))
        );
        dissociate(&mut updater, &ok).unwrap();
        assert!(updater.relationship(&addr(HOLDER), &addr(FUNGIBLE)).unwrap().is_none());
        assert_eq!(updater.get(&addr(HOLDER)).unwrap().unwrap().num_associations, 0);
    }

    #[test]
    fn test_mint_fungible_and_max_supply() {
        let view = world();
        let mut updater = view.updater();
        let result = mint(
            &mut updater,
            &TokenMintBody {
                token: addr(FUNGIBLE),
                amount: 50,
                metadata: vec![],
            },
        )
        .unwrap();
        assert_eq!(result.total_supply, 150);
        assert_eq!(
            mint(
                &mut updater,
                &TokenMintBody {
                    token: addr(FUNGIBLE),
                    amount: 1,
                    metadata: vec![],
                }
            ),
            Err(failed(ResponseCode::TokenMaxSupplyReached))
        );
        assert_eq!(
            updater.relationship(&addr(TREASURY), &addr(FUNGIBLE)).unwrap().unwrap().balance,
            150
        );
    }

    #[test]
    fn test_mint_nft_assigns_serials() {
        let view = world();
        let mut updater = view.updater();
        let result = mint(
            &mut updater,
            &TokenMintBody {
                token: addr(UNIQUE),
                amount: 0,
                metadata: vec![Bytes::from_slice(b"a"), Bytes::from_slice(b"b")],
            },
        )
        .unwrap();
        assert_eq!(result.serials, vec![2, 3]);
        assert_eq!(result.total_supply, 3);
        assert_eq!(updater.nft(&addr(UNIQUE), 3).unwrap().unwrap().owner, addr(TREASURY));
        assert_eq!(updater.get(&addr(TREASURY)).unwrap().unwrap().owned_nfts, 3);
        assert_eq!(updater.token(&addr(UNIQUE)).unwrap().unwrap().last_used_serial, 3);
    }

    #[test]
    fn test_mint_nft_serial_overflow_fails() {
        let view = world();
        let mut updater = view.updater();
        let mut token = updater.token(&addr(UNIQUE)).unwrap().unwrap();
        token.last_used_serial = i64::MAX - 1;
        updater.put_token(token);
        let body = |count: usize| TokenMintBody {
            token: addr(UNIQUE),
            amount: 0,
            metadata: vec![Bytes::from_slice(b"x"); count],
        };

        assert_eq!(
            mint(&mut updater, &body(2)),
            Err(failed(ResponseCode::InvalidTokenMintAmount))
        );
        assert!(updater.nft(&addr(UNIQUE), i64::MAX).unwrap().is_none());

        let last = mint(&mut updater, &body(1)).unwrap();
        assert_eq!(last.serials, vec![i64::MAX]);
    }

    #[test]
    fn test_burn_rules() {
        let view = world();
        let mut updater = view.updater();
        assert_eq!(
            burn(
                &mut updater,
                &TokenBurnBody {
                    token: addr(FUNGIBLE),
                    amount: 0,
                    serials: vec![]
                }
            ),
            Err(failed(ResponseCode::InvalidTokenBurnAmount))
        );
        assert_eq!(
            burn(
                &mut updater,
                &TokenBurnBody {
                    token: addr(UNIQUE),
                    amount: 0,
                    serials: vec![9]
                }
            ),
            Err(failed(ResponseCode::InvalidNftId))
        );
        let result = burn(
            &mut updater,
            &TokenBurnBody {
                token: addr(UNIQUE),
                amount: 0,
                serials: vec![1],
            },
        )
        .unwrap();
        assert_eq!(result.total_supply, 0);
        assert!(updater.nft(&addr(UNIQUE), 1).unwrap().is_none());
        assert_eq!(updater.get(&addr(TREASURY)).unwrap().unwrap().owned_nfts, 0);
    }

    #[test]
    fn test_wipe_rules() {
        let view = world();
        let mut updater = view.updater();
        let body = |account: u64, amount: u64| TokenWipeBody {
            token: addr(FUNGIBLE),
            account: addr(account),
            amount,
            serials: vec![],
        };
        assert_eq!(
            wipe(&mut updater, &body(TREASURY, 1)),
            Err(failed(ResponseCode::CannotWipeTokenTreasuryAccount))
        );
        assert_eq!(
            wipe(&mut updater, &body(HOLDER, 1)),
            Err(failed(ResponseCode::InvalidWipingAmount))
        );
        assert_eq!(
            wipe(
                &mut updater,
                &TokenWipeBody {
                    token: addr(UNIQUE),
                    account: addr(HOLDER),
                    amount: 0,
                    serials: vec![1],
                }
            ),
            Err(failed(ResponseCode::TokenHasNoWipeKey))
        );
    }

    fn fungible_legs(from: u64, to: u64, amount: i64, is_approval: bool) -> CryptoTransferBody {
        CryptoTransferBody {
            hbar_transfers: vec![],
            token_transfers: vec![TokenTransferList {
                token: addr(FUNGIBLE),
                transfers: vec![
                    AccountAmount {
                        account: addr(from),
                        amount: -amount,
                        is_approval,
                    },
                    AccountAmount {
                        account: addr(to),
                        amount,
                        is_approval: false,
                    },
                ],
                nft_transfers: vec![],
            }],
        }
    }

    #[test]
    fn test_fungible_transfer_moves_balances() {
        let view = world();
        let mut updater = view.updater();
        transfer(&mut updater, &fungible_legs(TREASURY, HOLDER, 30, false), &addr(TREASURY)).unwrap();
        assert_eq!(
            updater.relationship(&addr(HOLDER), &addr(FUNGIBLE)).unwrap().unwrap().balance,
            30
        );
        assert!(updater.has_any_token_balance(&addr(HOLDER)).unwrap());
        assert_eq!(
            transfer(&mut updater, &fungible_legs(HOLDER, TREASURY, 31, false), &addr(HOLDER)),
            Err(failed(ResponseCode::InsufficientTokenBalance))
        );
    }

    #[test]
    fn test_approval_transfer_spends_allowance() {
        let view = world();
        let mut updater = view.updater();
        let legs = fungible_legs(TREASURY, HOLDER, 10, true);
        assert_eq!(
            transfer(&mut updater, &legs, &addr(SPENDER)),
            Err(failed(ResponseCode::SpenderDoesNotHaveAllowance))
        );
        approve(
            &mut updater,
            &ApproveAllowanceBody {
                token_allowances: vec![TokenAllowance {
                    token: addr(FUNGIBLE),
                    owner: addr(TREASURY),
                    spender: addr(SPENDER),
                    amount: 15,
                }],
                nft_allowances: vec![],
            },
        )
        .unwrap();
        transfer(&mut updater, &legs, &addr(SPENDER)).unwrap();
        assert_eq!(
            updater.allowance(&addr(TREASURY), &addr(FUNGIBLE), &addr(SPENDER)).unwrap(),
            5
        );
        assert_eq!(
            transfer(&mut updater, &legs, &addr(SPENDER)),
            Err(failed(ResponseCode::AmountExceedsAllowance))
        );
    }

    #[test]
    fn test_nft_approval_and_transfer() {
        let view = world();
        let mut updater = view.updater();
        associate(
            &mut updater,
            &TokenRelationsBody {
                account: addr(HOLDER),
                tokens: vec![addr(UNIQUE)],
            },
        )
        .unwrap();
        approve(
            &mut updater,
            &ApproveAllowanceBody {
                token_allowances: vec![],
                nft_allowances: vec![NftAllowance {
                    token: addr(UNIQUE),
                    owner: addr(TREASURY),
                    spender: addr(SPENDER),
                    serials: vec![1],
                }],
            },
        )
        .unwrap();
        let info = ApproveDecodedNftInfo {
            token: addr(UNIQUE),
            serial: U256::one(),
        };
        assert_eq!(get_approved(&updater, &info).unwrap().spender, addr(SPENDER));

        let body = CryptoTransferBody {
            hbar_transfers: vec![],
            token_transfers: vec![TokenTransferList {
                token: addr(UNIQUE),
                transfers: vec![],
                nft_transfers: vec![NftTransfer {
                    sender: addr(TREASURY),
                    receiver: addr(HOLDER),
                    serial: 1,
                    is_approval: true,
                }],
            }],
        };
        transfer(&mut updater, &body, &addr(SPENDER)).unwrap();
        let nft = updater.nft(&addr(UNIQUE), 1).unwrap().unwrap();
        assert_eq!(nft.owner, addr(HOLDER));
        assert_eq!(nft.spender, Address::ZERO);
        assert!(updater.owns_nfts(&addr(HOLDER)).unwrap());
        assert!(!updater.owns_nfts(&addr(TREASURY)).unwrap());
    }

    #[test]
    fn test_get_approved_writes_nothing() {
        let view = world();
        let updater = view.updater();
        let info = ApproveDecodedNftInfo {
            token: addr(UNIQUE),
            serial: U256::from(7),
        };
        assert_eq!(get_approved(&updater, &info), Err(failed(ResponseCode::InvalidNftId)));
        assert!(updater.journal().is_empty());
    }

    #[test]
    fn test_create_fungible_allocates_token() {
        let view = world();
        let mut updater = view.updater();
        let body = TokenCreateBody {
            name: "Coin".into(),
            symbol: "C".into(),
            treasury: addr(HOLDER),
            initial_supply: 500,
            decimals: 2,
            token_type: TokenType::FungibleCommon,
            supply_key: true,
        };
        let created = create_fungible(&mut updater, &body, &addr(HOLDER)).unwrap();
        let token = updater.token(&created.token).unwrap().unwrap();
        assert_eq!(token.total_supply, 500);
        assert!(updater.is_token_treasury(&addr(HOLDER)).unwrap());

        let orphan = TokenCreateBody {
            treasury: addr(9999),
            ..body
        };
        assert_eq!(
            create_fungible(&mut updater, &orphan, &addr(HOLDER)),
            Err(failed(ResponseCode::InvalidTreasuryAccountForToken))
        );
    }
}
