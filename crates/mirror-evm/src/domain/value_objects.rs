//! # Value Objects
//!
//! Immutable primitives shared by the interpreter, the world state and the
//! pricing code. These types are defined by their value, not identity.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub use primitive_types::U256;

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte EVM address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address (0x0000...0000).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 20 {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Creates an address whose last eight bytes hold `num`.
    #[must_use]
    pub const fn from_low_u64(num: u64) -> Self {
        let be = num.to_be_bytes();
        let mut bytes = [0u8; 20];
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Takes the low 20 bytes of a stack word.
    #[must_use]
    pub fn from_word(word: U256) -> Self {
        let mut buf = [0u8; 32];
        word.to_big_endian(&mut buf);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&buf[12..]);
        Self(bytes)
    }

    /// Left-pads the address into a stack word.
    #[must_use]
    pub fn to_word(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// True when the first twelve bytes are zero, i.e. the address encodes
    /// an entity number rather than an ECDSA alias.
    #[must_use]
    pub fn is_long_zero(&self) -> bool {
        self.0[..12] == [0u8; 12]
    }

    /// Checks if this address is a standard precompiled contract (0x01-0x09).
    #[must_use]
    pub fn is_precompile(&self) -> bool {
        if self.0[..19] != [0u8; 19] {
            return false;
        }
        (1..=9).contains(&self.0[19])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<Address> for [u8; 20] {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

// =============================================================================
// ENTITY ID (shard.realm.num)
// =============================================================================

/// Ledger entity identifier, e.g. `0.0.1234`.
///
/// Accounts, contracts and tokens share one number space. Each id maps to a
/// "long-zero" EVM address: 4 bytes shard, 8 bytes realm, 8 bytes num.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    /// Shard number.
    pub shard: u32,
    /// Realm number.
    pub realm: u64,
    /// Entity number.
    pub num: u64,
}

/// Accounts and contracts.
pub type AccountId = EntityId;

/// Fungible and non-fungible tokens.
pub type TokenId = EntityId;

impl EntityId {
    /// Creates a new entity id.
    #[must_use]
    pub const fn new(shard: u32, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Shorthand for `0.0.num`.
    #[must_use]
    pub const fn of_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    /// Encodes the id as a long-zero address.
    #[must_use]
    pub fn to_address(&self) -> Address {
        let mut bytes = [0u8; 20];
        bytes[..4].copy_from_slice(&self.shard.to_be_bytes());
        bytes[4..12].copy_from_slice(&self.realm.to_be_bytes());
        bytes[12..].copy_from_slice(&self.num.to_be_bytes());
        Address(bytes)
    }

    /// Decodes a long-zero address. Alias addresses yield `None`.
    #[must_use]
    pub fn from_address(address: &Address) -> Option<Self> {
        if !address.is_long_zero() {
            return None;
        }
        let mut num = [0u8; 8];
        num.copy_from_slice(&address.0[12..]);
        Some(Self::of_num(u64::from_be_bytes(num)))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// HASH (32 bytes)
// =============================================================================

/// A 32-byte hash (e.g., Keccak-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a hash from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a hash from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 32 {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Interprets the hash as a big-endian word.
    #[must_use]
    pub fn to_word(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Returns true if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...")?;
        for byte in &self.0[28..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

// =============================================================================
// STORAGE KEY & VALUE (32 bytes each)
// =============================================================================

/// A 32-byte storage key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StorageKey(pub [u8; 32]);

impl StorageKey {
    /// Creates a storage key from a U256.
    #[must_use]
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", U256::from_big_endian(&self.0))
    }
}

impl From<U256> for StorageKey {
    fn from(value: U256) -> Self {
        Self::from_u256(value)
    }
}

/// A 32-byte storage value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StorageValue(pub [u8; 32]);

impl StorageValue {
    /// The zero value.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a storage value from a U256.
    #[must_use]
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }

    /// Converts to U256.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Returns true if this is the zero value.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageValue({})", self.to_u256())
    }
}

impl From<U256> for StorageValue {
    fn from(value: U256) -> Self {
        Self::from_u256(value)
    }
}

// =============================================================================
// BYTES (variable length)
// =============================================================================

/// Variable-length byte vector for calldata, return data, and code.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Creates an empty Bytes.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates Bytes from a slice.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }

    /// Returns the underlying vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Returns a reference to the underlying slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        if self.0.len() <= 8 {
            for byte in &self.0 {
                write!(f, "{byte:02x}")?;
            }
        } else {
            for byte in &self.0[..4] {
                write!(f, "{byte:02x}")?;
            }
            write!(f, "..({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(vec: Vec<u8>) -> Self {
        Self(vec)
    }
}

impl From<&[u8]> for Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Consensus timestamp in nanoseconds since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    const NANOS_PER_SECOND: i64 = 1_000_000_000;

    /// Creates a timestamp from whole seconds.
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(Self::NANOS_PER_SECOND))
    }

    /// Whole seconds, truncated. Fee schedules and exchange rates are keyed
    /// on this value.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.0.div_euclid(Self::NANOS_PER_SECOND)
    }

    /// Raw nanoseconds.
    #[must_use]
    pub const fn nanos(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09}",
            self.seconds(),
            self.0.rem_euclid(Self::NANOS_PER_SECOND)
        )
    }
}

// =============================================================================
// SEMANTIC VERSION
// =============================================================================

/// Protocol semantic version, e.g. `0.38.0`. Ordered lexicographically by
/// (major, minor, patch).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl SemanticVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for SemanticVersion {
    type Err = String;

    /// Accepts `0.38`, `0.38.0` and `v0.38.0`. Build metadata and
    /// pre-release suffixes are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(format!("invalid semantic version: {s}"));
        }
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| format!("invalid semantic version: {s}"))
        };
        let major = parse(parts[0])?;
        let minor = parse(parts[1])?;
        let patch = match parts.get(2) {
            Some(p) => parse(p)?,
            None => 0,
        };
        Ok(Self::new(major, minor, patch))
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemanticVersion> for String {
    fn from(version: SemanticVersion) -> Self {
        version.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
