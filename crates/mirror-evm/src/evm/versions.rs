//! # Versioned Operation Sets
//!
//! One immutable [`VersionedOperationSet`] per protocol version, and the
//! [`VersionRegistry`] that maps a consensus timestamp to the set that was
//! active at that time.
//!
//! ## Versions
//!
//! | Version | Spec     | Self-destruct                     | Address checks          |
//! |---------|----------|-----------------------------------|-------------------------|
//! | 0.30    | London   | halt checks only                  | existence               |
//! | 0.34    | Paris    | halt checks only                  | existence               |
//! | 0.38    | Shanghai | + beneficiary validation          | existence, system accts |
//! | 0.46    | Shanghai | + beneficiary validation          | existence, system accts |
//! | 0.50    | Cancun   | + beneficiary validation, EIP-6780| existence, system accts |
//! | 0.51    | Cancun   | same as 0.50                      | same as 0.50            |

use crate::config::VersionEntry;
use crate::domain::value_objects::{SemanticVersion, Timestamp};
use crate::errors::ConfigError;
use crate::evm::opcodes::Opcode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// EVM SPEC
// =============================================================================

/// Upstream hard fork an operation set is built on.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EvmSpec {
    /// BASEFEE, no PUSH0.
    London,
    /// PREVRANDAO replaces DIFFICULTY.
    Paris,
    /// PUSH0.
    Shanghai,
    /// TLOAD, TSTORE, MCOPY, BLOBHASH, BLOBBASEFEE.
    Cancun,
}

impl EvmSpec {
    /// True when 0x44 returns the PRNG seed rather than a zero difficulty.
    #[must_use]
    pub fn has_prevrandao(self) -> bool {
        self >= Self::Paris
    }

    /// True when init code size is capped and metered (EIP-3860).
    #[must_use]
    pub fn limits_init_code(self) -> bool {
        self >= Self::Shanghai
    }
}

// =============================================================================
// OPERATION VARIANTS
// =============================================================================

/// SELFDESTRUCT behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfDestructRule {
    /// Halt with INVALID_SOLIDITY_ADDRESS when the beneficiary does not
    /// exist or is a system account.
    pub validate_beneficiary: bool,
    /// Only contracts created in the current transaction are deleted; the
    /// halt checks are skipped for all others (EIP-6780).
    pub eip6780: bool,
}

/// Target checks of BALANCE, EXTCODESIZE, EXTCODECOPY, EXTCODEHASH and
/// DELEGATECALL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRule {
    /// Halt with INVALID_SOLIDITY_ADDRESS for absent targets.
    pub validate_existence: bool,
    /// Addresses at or below the system boundary answer zero without a
    /// lookup.
    pub detect_system_accounts: bool,
}

/// Everything that varies between protocol versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedOperationSet {
    version: SemanticVersion,
    spec: EvmSpec,
    self_destruct: SelfDestructRule,
    address_rule: AddressRule,
    enabled: [bool; 256],
}

impl VersionedOperationSet {
    /// Builds a set from its parts. An opcode is enabled when `spec` is at
    /// least the hard fork that introduced it.
    #[must_use]
    pub fn new(
        version: SemanticVersion,
        spec: EvmSpec,
        self_destruct: SelfDestructRule,
        address_rule: AddressRule,
    ) -> Self {
        let mut enabled = [false; 256];
        for (byte, slot) in enabled.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let op = Opcode(byte as u8);
            *slot = op.introduced_in().is_some_and(|since| since <= spec);
        }
        Self {
            version,
            spec,
            self_destruct,
            address_rule,
            enabled,
        }
    }

    /// The built-in set for a known version.
    #[must_use]
    pub fn for_version(version: SemanticVersion) -> Option<Self> {
        let base = SelfDestructRule {
            validate_beneficiary: false,
            eip6780: false,
        };
        let validated = SelfDestructRule {
            validate_beneficiary: true,
            eip6780: false,
        };
        let eip6780 = SelfDestructRule {
            validate_beneficiary: true,
            eip6780: true,
        };
        let existence = AddressRule {
            validate_existence: true,
            detect_system_accounts: false,
        };
        let system = AddressRule {
            validate_existence: true,
            detect_system_accounts: true,
        };

        let (spec, self_destruct, address_rule) = match (version.major, version.minor) {
            (0, 30) => (EvmSpec::London, base, existence),
            (0, 34) => (EvmSpec::Paris, base, existence),
            (0, 38) | (0, 46) => (EvmSpec::Shanghai, validated, system),
            (0, 50) | (0, 51) => (EvmSpec::Cancun, eip6780, system),
            _ => return None,
        };
        Some(Self::new(version, spec, self_destruct, address_rule))
    }

    /// Protocol version.
    #[must_use]
    pub fn version(&self) -> SemanticVersion {
        self.version
    }

    /// Underlying hard fork.
    #[must_use]
    pub fn spec(&self) -> EvmSpec {
        self.spec
    }

    /// SELFDESTRUCT variant.
    #[must_use]
    pub fn self_destruct(&self) -> SelfDestructRule {
        self.self_destruct
    }

    /// Address check variant.
    #[must_use]
    pub fn address_rule(&self) -> AddressRule {
        self.address_rule
    }

    /// True when the opcode is executable under this set.
    #[must_use]
    pub fn is_enabled(&self, op: Opcode) -> bool {
        self.enabled[usize::from(op.0)]
    }
}

/// Versions with a built-in operation set, oldest first.
pub const REGISTERED_VERSIONS: [SemanticVersion; 6] = [
    SemanticVersion::new(0, 30, 0),
    SemanticVersion::new(0, 34, 0),
    SemanticVersion::new(0, 38, 0),
    SemanticVersion::new(0, 46, 0),
    SemanticVersion::new(0, 50, 0),
    SemanticVersion::new(0, 51, 0),
];

// =============================================================================
// VERSION REGISTRY
// =============================================================================

/// Time-ordered version table. Built once at startup, then shared
/// read-only.
#[derive(Clone, Debug)]
pub struct VersionRegistry {
    timeline: Vec<(Timestamp, Arc<VersionedOperationSet>)>,
    by_version: HashMap<SemanticVersion, Arc<VersionedOperationSet>>,
}

impl VersionRegistry {
    /// Validates a version table and builds every set it names.
    ///
    /// # Errors
    ///
    /// - `EmptyVersionTable` for an empty table
    /// - `UnorderedVersionTable` when effective times are not strictly
    ///   increasing
    /// - `UnknownVersion` when a version has no built-in set
    pub fn new(table: &[VersionEntry]) -> Result<Self, ConfigError> {
        if table.is_empty() {
            return Err(ConfigError::EmptyVersionTable);
        }

        let mut timeline = Vec::with_capacity(table.len());
        let mut by_version = HashMap::new();
        let mut previous: Option<Timestamp> = None;

        for entry in table {
            if previous.is_some_and(|prev| entry.effective_from <= prev) {
                return Err(ConfigError::UnorderedVersionTable(entry.semantic_version));
            }
            previous = Some(entry.effective_from);

            let set = VersionedOperationSet::for_version(entry.semantic_version)
                .ok_or(ConfigError::UnknownVersion(entry.semantic_version))?;
            let set = Arc::new(set);
            by_version.insert(entry.semantic_version, Arc::clone(&set));
            timeline.push((entry.effective_from, set));
        }

        Ok(Self {
            timeline,
            by_version,
        })
    }

    /// The set active at `at`: the entry with the greatest effective time
    /// not after `at`. Times before the first entry resolve to the first
    /// entry. A registered `hint` wins over the timestamp.
    #[must_use]
    pub fn resolve(
        &self,
        at: Timestamp,
        hint: Option<SemanticVersion>,
    ) -> Arc<VersionedOperationSet> {
        if let Some(version) = hint {
            if let Some(set) = self.by_version.get(&version) {
                debug!(%version, "version taken from hint");
                return Arc::clone(set);
            }
            debug!(%version, "version hint not registered, resolving by time");
        }

        let index = self
            .timeline
            .partition_point(|(effective_from, _)| *effective_from <= at)
            .saturating_sub(1);
        let set = Arc::clone(&self.timeline[index].1);
        debug!(at = ?at, version = %set.version(), "version resolved");
        set
    }

    /// The set registered for `version`.
    #[must_use]
    pub fn get(&self, version: &SemanticVersion) -> Option<Arc<VersionedOperationSet>> {
        self.by_version.get(version).cloned()
    }

    /// The newest set.
    #[must_use]
    pub fn latest(&self) -> Arc<VersionedOperationSet> {
        let (_, set) = &self.timeline[self.timeline.len() - 1];
        Arc::clone(set)
    }

    /// Number of table entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    /// Always false; construction rejects empty tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
