//! # Configuration
//!
//! Engine and telemetry settings. Every value has a default and may be
//! overridden from the environment.
//!
//! ## Environment Variables
//!
//! - `MIRROR_EVM_CHAIN_ID`: Chain id (default: 296)
//! - `MIRROR_EVM_REDIRECT_TOKEN_CALLS`: Token proxy calls (default: true)
//! - `MIRROR_EVM_MAX_GAS_LIMIT`: Highest accepted gas limit (default: 15000000)
//! - `MIRROR_EVM_MAX_CALL_DEPTH`: Call depth limit (default: 1024)
//! - `MIRROR_EVM_TIMEOUT_MS`: Per-call deadline (default: 10000)
//! - `MIRROR_EVM_VERSIONS`: Version table, `0.30@0,0.34@1676000000,...`
//! - `MIRROR_EVM_TRACE_MODE`: `OPCODE` or `OPERATION` (default: OPERATION)
//! - `MIRROR_EVM_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
//! - `MIRROR_EVM_JSON_LOGS`: JSON log output (default: false)

use crate::cache::CachePolicy;
use crate::domain::entities::TracerType;
use crate::domain::value_objects::{SemanticVersion, Timestamp};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// VERSION TABLE
// =============================================================================

/// One row of the version table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Protocol version.
    pub semantic_version: SemanticVersion,
    /// First consensus time the version applies to, inclusive.
    pub effective_from: Timestamp,
}

impl VersionEntry {
    /// Creates an entry effective from `seconds`.
    #[must_use]
    pub const fn new(semantic_version: SemanticVersion, seconds: i64) -> Self {
        Self {
            semantic_version,
            effective_from: Timestamp::from_seconds(seconds),
        }
    }
}

/// Known protocol versions in activation order.
pub const DEFAULT_VERSION_TABLE: [VersionEntry; 6] = [
    VersionEntry::new(SemanticVersion::new(0, 30, 0), 0),
    VersionEntry::new(SemanticVersion::new(0, 34, 0), 1_676_000_000),
    VersionEntry::new(SemanticVersion::new(0, 38, 0), 1_691_000_000),
    VersionEntry::new(SemanticVersion::new(0, 46, 0), 1_707_000_000),
    VersionEntry::new(SemanticVersion::new(0, 50, 0), 1_716_000_000),
    VersionEntry::new(SemanticVersion::new(0, 51, 0), 1_721_000_000),
];

fn parse_version_table(key: &str, raw: &str) -> Result<Vec<VersionEntry>, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    };
    raw.split(',')
        .filter(|row| !row.trim().is_empty())
        .map(|row| {
            let (version, seconds) = row.split_once('@').ok_or_else(invalid)?;
            let version = version.parse::<SemanticVersion>().map_err(|_| invalid())?;
            let seconds = seconds.trim().parse::<i64>().map_err(|_| invalid())?;
            Ok(VersionEntry::new(version, seconds))
        })
        .collect()
}

// =============================================================================
// CACHE SETTINGS
// =============================================================================

/// Policies of the read-through caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Latest record file.
    pub record_file_latest: CachePolicy,
    /// Record file by index.
    pub record_file_index: CachePolicy,
    /// Record file by timestamp.
    pub record_file_timestamp: CachePolicy,
    /// Earliest record file.
    pub record_file_earliest: CachePolicy,
    /// Accounts and contracts.
    pub entity: CachePolicy,
    /// Tokens.
    pub token: CachePolicy,
    /// Contract bytecode.
    pub contract: CachePolicy,
    /// Contract storage slots.
    pub contract_slots: CachePolicy,
    /// System accounts.
    pub system_account: CachePolicy,
    /// Fee schedules and exchange rates.
    pub fee_schedule: CachePolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let one_second = Duration::from_secs(1);
        let ten_minutes = Duration::from_secs(600);
        Self {
            record_file_latest: CachePolicy::after_write(1, Duration::from_millis(500)),
            record_file_index: CachePolicy::after_write(10_000, ten_minutes),
            record_file_timestamp: CachePolicy::after_access(10_000, ten_minutes),
            record_file_earliest: CachePolicy::unbounded_time(1),
            entity: CachePolicy::after_write(10_000, one_second),
            token: CachePolicy::after_write(2_000, one_second),
            contract: CachePolicy::after_write(1_000, one_second),
            contract_slots: CachePolicy::after_write(50_000, one_second),
            system_account: CachePolicy::after_write(1_000, one_second),
            fee_schedule: CachePolicy::after_write(20, one_second),
        }
    }
}

// =============================================================================
// ENGINE PROPERTIES
// =============================================================================

/// Engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmProperties {
    /// Value of CHAINID.
    pub chain_id: u64,
    /// Whether token addresses read as token pseudo-accounts.
    pub redirect_token_calls_enabled: bool,
    /// Highest gas limit a call may request.
    pub max_gas_limit: u64,
    /// Maximum frame depth.
    pub max_call_depth: u16,
    /// Per-call deadline.
    pub execution_timeout_ms: u64,
    /// Version table, strictly increasing in effective time.
    pub evm_versions: Vec<VersionEntry>,
    /// Default tracer.
    pub trace_mode: TracerType,
    /// Cache policies.
    pub cache: CacheSettings,
}

impl Default for EvmProperties {
    fn default() -> Self {
        Self {
            chain_id: 0x128,
            redirect_token_calls_enabled: true,
            max_gas_limit: 15_000_000,
            max_call_depth: 1024,
            execution_timeout_ms: 10_000,
            evm_versions: DEFAULT_VERSION_TABLE.to_vec(),
            trace_mode: TracerType::Operation,
            cache: CacheSettings::default(),
        }
    }
}

impl EvmProperties {
    /// Reads `MIRROR_EVM_*` variables over the defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let evm_versions = match env::var("MIRROR_EVM_VERSIONS") {
            Ok(raw) => parse_version_table("MIRROR_EVM_VERSIONS", &raw)?,
            Err(_) => defaults.evm_versions,
        };
        let trace_mode = match env::var("MIRROR_EVM_TRACE_MODE") {
            Ok(raw) => match raw.to_uppercase().as_str() {
                "OPCODE" => TracerType::Opcode,
                "OPERATION" => TracerType::Operation,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "MIRROR_EVM_TRACE_MODE".into(),
                        value: raw,
                    })
                }
            },
            Err(_) => defaults.trace_mode,
        };

        Ok(Self {
            chain_id: env_or("MIRROR_EVM_CHAIN_ID", defaults.chain_id)?,
            redirect_token_calls_enabled: env_flag(
                "MIRROR_EVM_REDIRECT_TOKEN_CALLS",
                defaults.redirect_token_calls_enabled,
            ),
            max_gas_limit: env_or("MIRROR_EVM_MAX_GAS_LIMIT", defaults.max_gas_limit)?,
            max_call_depth: env_or("MIRROR_EVM_MAX_CALL_DEPTH", defaults.max_call_depth)?,
            execution_timeout_ms: env_or("MIRROR_EVM_TIMEOUT_MS", defaults.execution_timeout_ms)?,
            evm_versions,
            trace_mode,
            cache: defaults.cache,
        })
    }

    /// Per-call deadline as a duration.
    #[must_use]
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

// =============================================================================
// TELEMETRY
// =============================================================================

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// JSON instead of human-readable lines.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Reads `MIRROR_EVM_LOG_LEVEL`, `RUST_LOG` and `MIRROR_EVM_JSON_LOGS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("MIRROR_EVM_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env_flag("MIRROR_EVM_JSON_LOGS", false),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
