//! # Ledger-Specific Operations
//!
//! Checks the interpreter runs before the standard behavior of
//! SELFDESTRUCT and of the address-inspecting opcodes (BALANCE,
//! EXTCODESIZE, EXTCODECOPY, EXTCODEHASH, DELEGATECALL). Which checks
//! apply is decided by the active [`VersionedOperationSet`].

use super::versions::{AddressRule, VersionedOperationSet};
use crate::domain::services::precompiles;
use crate::domain::value_objects::{Address, EntityId};
use crate::errors::{ExceptionalHaltReason, StateError};
use crate::state::WorldView;

/// Outcome of validating an address operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressCheck {
    /// Perform the real lookup.
    Regular,
    /// Reserved system account: answer zero at the fixed cost.
    SystemAccount,
    /// Halt with INVALID_SOLIDITY_ADDRESS.
    Invalid,
}

/// True for long-zero addresses numbered at or below the system boundary.
#[must_use]
pub fn is_system_account(address: &Address) -> bool {
    EntityId::from_address(address)
        .is_some_and(|id| id.num <= precompiles::SYSTEM_ACCOUNT_BOUNDARY)
}

/// True for addresses served by a precompile rather than an account.
#[must_use]
pub fn is_precompile_address(address: &Address) -> bool {
    address.is_precompile()
        || *address == precompiles::TOKEN_SERVICE
        || *address == precompiles::EXCHANGE_RATE
        || *address == precompiles::PRNG
}

/// Existence validator: an account is visible or a precompile answers.
///
/// # Errors
///
/// Snapshot failures.
pub fn address_exists(view: &dyn WorldView, address: &Address) -> Result<bool, StateError> {
    Ok(is_precompile_address(address) || view.exists(address)?)
}

/// Classifies an address operand under `rule`.
///
/// # Errors
///
/// Snapshot failures.
pub fn check_address(
    view: &dyn WorldView,
    rule: AddressRule,
    address: &Address,
) -> Result<AddressCheck, StateError> {
    if rule.detect_system_accounts && is_system_account(address) {
        return Ok(AddressCheck::SystemAccount);
    }
    if rule.validate_existence && !address_exists(view, address)? {
        return Ok(AddressCheck::Invalid);
    }
    Ok(AddressCheck::Regular)
}

/// Business rules that stop a contract from being deleted, in priority
/// order.
///
/// # Errors
///
/// Snapshot failures.
pub fn reason_to_halt(
    view: &dyn WorldView,
    to_be_deleted: &Address,
    beneficiary: &Address,
) -> Result<Option<ExceptionalHaltReason>, StateError> {
    if to_be_deleted == beneficiary {
        return Ok(Some(ExceptionalHaltReason::SelfDestructToSelf));
    }
    if view.is_token_treasury(to_be_deleted)? {
        return Ok(Some(ExceptionalHaltReason::ContractIsTreasury));
    }
    if view.has_any_token_balance(to_be_deleted)? {
        return Ok(Some(ExceptionalHaltReason::TransactionRequiresZeroTokenBalances));
    }
    if view.owns_nfts(to_be_deleted)? {
        return Ok(Some(ExceptionalHaltReason::ContractStillOwnsNfts));
    }
    Ok(None)
}

/// Full SELFDESTRUCT check for the active version.
///
/// Beneficiary validation (when enabled) runs first. Under EIP-6780 the
/// business rules only apply to contracts created in this call.
///
/// # Errors
///
/// Snapshot failures.
pub fn self_destruct_halt(
    view: &dyn WorldView,
    set: &VersionedOperationSet,
    to_be_deleted: &Address,
    beneficiary: &Address,
) -> Result<Option<ExceptionalHaltReason>, StateError> {
    let rule = set.self_destruct();
    if rule.validate_beneficiary
        && (is_system_account(beneficiary) || !address_exists(view, beneficiary)?)
    {
        return Ok(Some(ExceptionalHaltReason::InvalidSolidityAddress));
    }
    if rule.eip6780 && !view.is_created_in_transaction(to_be_deleted) {
        return Ok(None);
    }
    reason_to_halt(view, to_be_deleted, beneficiary)
}

// =============================================================================
// TESTS
// =============================================================================
