//! # ABI Codec
//!
//! The slice of the Solidity ABI the token precompiles speak: addresses,
//! 256-bit unsigned words, `int64`, `bool`, `string`, `bytes` and
//! one-dimensional dynamic arrays of those. Every value occupies one head
//! word; dynamic values point into the tail.

use crate::domain::services::keccak256;
use crate::domain::value_objects::{Address, U256};
use crate::errors::PrecompileError;

/// ABI word size.
pub const WORD: usize = 32;

/// A 4-byte function selector.
pub type Selector = [u8; 4];

/// First four bytes of `keccak256(signature)`.
#[must_use]
pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// Declared parameter type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `address`
    Address,
    /// `uint8` to `uint256`
    Uint,
    /// `int64`
    Int64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// `T[]`
    Array(Box<ParamType>),
}

impl ParamType {
    fn is_dynamic(&self) -> bool {
        matches!(self, Self::String | Self::Bytes | Self::Array(_))
    }
}

/// A decoded or to-be-encoded value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// Unsigned word.
    Uint(U256),
    /// `int64`, sign-extended on the wire.
    Int(i64),
    /// `bool`
    Bool(bool),
    /// UTF-8 `string`.
    String(String),
    /// `bytes`
    Bytes(Vec<u8>),
    /// Dynamic array.
    Array(Vec<Token>),
}

fn decode_error(what: impl Into<String>) -> PrecompileError {
    PrecompileError::Decode(what.into())
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Self::String(_) | Self::Bytes(_) | Self::Array(_))
    }

    /// The address inside an `Address` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_address(self) -> Result<Address, PrecompileError> {
        match self {
            Self::Address(address) => Ok(address),
            other => Err(decode_error(format!("expected address, got {other:?}"))),
        }
    }

    /// The word inside a `Uint` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_uint(self) -> Result<U256, PrecompileError> {
        match self {
            Self::Uint(value) => Ok(value),
            other => Err(decode_error(format!("expected uint, got {other:?}"))),
        }
    }

    /// A `Uint` token that fits in a `u64`.
    ///
    /// # Errors
    ///
    /// `Decode` for other tokens or wider values.
    pub fn into_u64(self) -> Result<u64, PrecompileError> {
        let value = self.into_uint()?;
        if value > U256::from(u64::MAX) {
            return Err(decode_error(format!("{value} does not fit in 64 bits")));
        }
        Ok(value.as_u64())
    }

    /// A `Uint` token that fits in an `i64`, as used for serial numbers.
    ///
    /// # Errors
    ///
    /// `Decode` for other tokens or wider values.
    pub fn into_serial(self) -> Result<i64, PrecompileError> {
        let value = self.into_u64()?;
        i64::try_from(value).map_err(|_| decode_error(format!("serial {value} out of range")))
    }

    /// The value inside an `Int` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_i64(self) -> Result<i64, PrecompileError> {
        match self {
            Self::Int(value) => Ok(value),
            other => Err(decode_error(format!("expected int64, got {other:?}"))),
        }
    }

    /// The string inside a `String` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_string(self) -> Result<String, PrecompileError> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(decode_error(format!("expected string, got {other:?}"))),
        }
    }

    /// The bytes inside a `Bytes` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_bytes(self) -> Result<Vec<u8>, PrecompileError> {
        match self {
            Self::Bytes(value) => Ok(value),
            other => Err(decode_error(format!("expected bytes, got {other:?}"))),
        }
    }

    /// The items inside an `Array` token.
    ///
    /// # Errors
    ///
    /// `Decode` for any other token.
    pub fn into_array(self) -> Result<Vec<Token>, PrecompileError> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(decode_error(format!("expected array, got {other:?}"))),
        }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn encode_static(token: &Token) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match token {
        Token::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
        Token::Uint(value) => value.to_big_endian(&mut word),
        Token::Int(value) => {
            if *value < 0 {
                word = [0xFF; WORD];
            }
            word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
        }
        Token::Bool(value) => word[WORD - 1] = u8::from(*value),
        Token::String(_) | Token::Bytes(_) | Token::Array(_) => {}
    }
    word
}

fn encode_packed_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&usize_word(data.len()));
    out.extend_from_slice(data);
    let padding = (WORD - data.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
}

fn encode_tail(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::String(value) => encode_packed_bytes(out, value.as_bytes()),
        Token::Bytes(value) => encode_packed_bytes(out, value),
        Token::Array(items) => {
            out.extend_from_slice(&usize_word(items.len()));
            out.extend(encode(items));
        }
        _ => out.extend_from_slice(&encode_static(token)),
    }
}

/// Encodes a tuple.
#[must_use]
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            encode_tail(token, &mut tail);
        } else {
            head.extend_from_slice(&encode_static(token));
        }
    }
    head.extend(tail);
    head
}

/// Selector followed by the encoded arguments.
#[must_use]
pub fn encode_call(selector: Selector, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector.to_vec();
    out.extend(encode(tokens));
    out
}

// =============================================================================
// DECODING
// =============================================================================

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], PrecompileError> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| decode_error(format!("word at {offset} past end of {} bytes", data.len())))
}

fn word_to_usize(word: &[u8]) -> Result<usize, PrecompileError> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return Err(decode_error(format!("offset or length {value} too large")));
    }
    Ok(value.as_usize())
}

fn decode_static(ty: &ParamType, word: &[u8]) -> Result<Token, PrecompileError> {
    match ty {
        ParamType::Address => Address::from_slice(&word[12..])
            .map(Token::Address)
            .ok_or_else(|| decode_error("bad address")),
        ParamType::Uint => Ok(Token::Uint(U256::from_big_endian(word))),
        ParamType::Int64 => {
            let mut low = [0u8; 8];
            low.copy_from_slice(&word[WORD - 8..]);
            let value = i64::from_be_bytes(low);
            let fill = if value < 0 { 0xFF } else { 0x00 };
            if word[..WORD - 8].iter().any(|byte| *byte != fill) {
                return Err(decode_error("int64 out of range"));
            }
            Ok(Token::Int(value))
        }
        ParamType::Bool => match U256::from_big_endian(word) {
            v if v.is_zero() => Ok(Token::Bool(false)),
            v if v == U256::one() => Ok(Token::Bool(true)),
            v => Err(decode_error(format!("bad bool {v}"))),
        },
        ParamType::String | ParamType::Bytes | ParamType::Array(_) => {
            Err(decode_error("dynamic type in static position"))
        }
    }
}

fn decode_dynamic(ty: &ParamType, tail: &[u8]) -> Result<Token, PrecompileError> {
    let len = word_to_usize(read_word(tail, 0)?)?;
    let body = &tail[WORD..];
    match ty {
        ParamType::Bytes | ParamType::String => {
            let raw = body
                .get(..len)
                .ok_or_else(|| decode_error(format!("{len} bytes past end")))?
                .to_vec();
            if *ty == ParamType::Bytes {
                Ok(Token::Bytes(raw))
            } else {
                String::from_utf8(raw)
                    .map(Token::String)
                    .map_err(|_| decode_error("string is not UTF-8"))
            }
        }
        ParamType::Array(inner) => {
            if len.saturating_mul(WORD) > body.len() {
                return Err(decode_error(format!("array of {len} items past end")));
            }
            (0..len)
                .map(|i| decode_param(inner, body, i * WORD))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Array)
        }
        _ => Err(decode_error("static type in dynamic position")),
    }
}

fn decode_param(ty: &ParamType, data: &[u8], head_offset: usize) -> Result<Token, PrecompileError> {
    let word = read_word(data, head_offset)?;
    if ty.is_dynamic() {
        let offset = word_to_usize(word)?;
        let tail = data
            .get(offset..)
            .ok_or_else(|| decode_error(format!("offset {offset} past end")))?;
        decode_dynamic(ty, tail)
    } else {
        decode_static(ty, word)
    }
}

/// Decodes a tuple.
///
/// # Errors
///
/// `Decode` for truncated or malformed input.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, PrecompileError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| decode_param(ty, data, i * WORD))
        .collect()
}

/// Checks the selector and decodes the arguments after it.
///
/// # Errors
///
/// `Decode` for a selector mismatch or malformed arguments.
pub fn decode_call(
    expected: Selector,
    types: &[ParamType],
    input: &[u8],
) -> Result<Vec<Token>, PrecompileError> {
    match input.get(..4) {
        Some(found) if found == expected => decode(types, &input[4..]),
        _ => Err(decode_error("selector mismatch")),
    }
}

/// Shorthand for `T[]`.
#[must_use]
pub fn array_of(inner: ParamType) -> ParamType {
    ParamType::Array(Box::new(inner))
}

// =============================================================================
// TESTS
// =============================================================================
