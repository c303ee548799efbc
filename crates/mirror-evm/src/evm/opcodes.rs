//! # EVM Opcodes
//!
//! Byte-indexed opcode table. Each defined opcode carries its mnemonic and
//! the first [`EvmSpec`] that knows it; the active operation set decides
//! whether a byte is executable.

use crate::evm::versions::EvmSpec;
use std::fmt;

/// A raw opcode byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u8);

macro_rules! opcode_table {
    ($($name:ident = $byte:literal since $spec:ident;)*) => {
        impl Opcode {
            $(
                #[doc = concat!("`", stringify!($name), "`")]
                pub const $name: Self = Self($byte);
            )*
        }

        const fn describe(byte: u8) -> Option<(&'static str, EvmSpec)> {
            match byte {
                $($byte => Some((stringify!($name), EvmSpec::$spec)),)*
                _ => None,
            }
        }
    };
}

#[rustfmt::skip]
opcode_table! {
    // Stop and arithmetic
    STOP = 0x00 since London;
    ADD = 0x01 since London;
    MUL = 0x02 since London;
    SUB = 0x03 since London;
    DIV = 0x04 since London;
    SDIV = 0x05 since London;
    MOD = 0x06 since London;
    SMOD = 0x07 since London;
    ADDMOD = 0x08 since London;
    MULMOD = 0x09 since London;
    EXP = 0x0A since London;
    SIGNEXTEND = 0x0B since London;

    // Comparison and bitwise
    LT = 0x10 since London;
    GT = 0x11 since London;
    SLT = 0x12 since London;
    SGT = 0x13 since London;
    EQ = 0x14 since London;
    ISZERO = 0x15 since London;
    AND = 0x16 since London;
    OR = 0x17 since London;
    XOR = 0x18 since London;
    NOT = 0x19 since London;
    BYTE = 0x1A since London;
    SHL = 0x1B since London;
    SHR = 0x1C since London;
    SAR = 0x1D since London;

    KECCAK256 = 0x20 since London;

    // Environment
    ADDRESS = 0x30 since London;
    BALANCE = 0x31 since London;
    ORIGIN = 0x32 since London;
    CALLER = 0x33 since London;
    CALLVALUE = 0x34 since London;
    CALLDATALOAD = 0x35 since London;
    CALLDATASIZE = 0x36 since London;
    CALLDATACOPY = 0x37 since London;
    CODESIZE = 0x38 since London;
    CODECOPY = 0x39 since London;
    GASPRICE = 0x3A since London;
    EXTCODESIZE = 0x3B since London;
    EXTCODECOPY = 0x3C since London;
    RETURNDATASIZE = 0x3D since London;
    RETURNDATACOPY = 0x3E since London;
    EXTCODEHASH = 0x3F since London;

    // Block
    BLOCKHASH = 0x40 since London;
    COINBASE = 0x41 since London;
    TIMESTAMP = 0x42 since London;
    NUMBER = 0x43 since London;
    PREVRANDAO = 0x44 since London;
    GASLIMIT = 0x45 since London;
    CHAINID = 0x46 since London;
    SELFBALANCE = 0x47 since London;
    BASEFEE = 0x48 since London;
    BLOBHASH = 0x49 since Cancun;
    BLOBBASEFEE = 0x4A since Cancun;

    // Stack, memory, storage and flow
    POP = 0x50 since London;
    MLOAD = 0x51 since London;
    MSTORE = 0x52 since London;
    MSTORE8 = 0x53 since London;
    SLOAD = 0x54 since London;
    SSTORE = 0x55 since London;
    JUMP = 0x56 since London;
    JUMPI = 0x57 since London;
    PC = 0x58 since London;
    MSIZE = 0x59 since London;
    GAS = 0x5A since London;
    JUMPDEST = 0x5B since London;
    TLOAD = 0x5C since Cancun;
    TSTORE = 0x5D since Cancun;
    MCOPY = 0x5E since Cancun;
    PUSH0 = 0x5F since Shanghai;

    PUSH1 = 0x60 since London;
    PUSH2 = 0x61 since London;
    PUSH3 = 0x62 since London;
    PUSH4 = 0x63 since London;
    PUSH5 = 0x64 since London;
    PUSH6 = 0x65 since London;
    PUSH7 = 0x66 since London;
    PUSH8 = 0x67 since London;
    PUSH9 = 0x68 since London;
    PUSH10 = 0x69 since London;
    PUSH11 = 0x6A since London;
    PUSH12 = 0x6B since London;
    PUSH13 = 0x6C since London;
    PUSH14 = 0x6D since London;
    PUSH15 = 0x6E since London;
    PUSH16 = 0x6F since London;
    PUSH17 = 0x70 since London;
    PUSH18 = 0x71 since London;
    PUSH19 = 0x72 since London;
    PUSH20 = 0x73 since London;
    PUSH21 = 0x74 since London;
    PUSH22 = 0x75 since London;
    PUSH23 = 0x76 since London;
    PUSH24 = 0x77 since London;
    PUSH25 = 0x78 since London;
    PUSH26 = 0x79 since London;
    PUSH27 = 0x7A since London;
    PUSH28 = 0x7B since London;
    PUSH29 = 0x7C since London;
    PUSH30 = 0x7D since London;
    PUSH31 = 0x7E since London;
    PUSH32 = 0x7F since London;

    DUP1 = 0x80 since London;
    DUP2 = 0x81 since London;
    DUP3 = 0x82 since London;
    DUP4 = 0x83 since London;
    DUP5 = 0x84 since London;
    DUP6 = 0x85 since London;
    DUP7 = 0x86 since London;
    DUP8 = 0x87 since London;
    DUP9 = 0x88 since London;
    DUP10 = 0x89 since London;
    DUP11 = 0x8A since London;
    DUP12 = 0x8B since London;
    DUP13 = 0x8C since London;
    DUP14 = 0x8D since London;
    DUP15 = 0x8E since London;
    DUP16 = 0x8F since London;

    SWAP1 = 0x90 since London;
    SWAP2 = 0x91 since London;
    SWAP3 = 0x92 since London;
    SWAP4 = 0x93 since London;
    SWAP5 = 0x94 since London;
    SWAP6 = 0x95 since London;
    SWAP7 = 0x96 since London;
    SWAP8 = 0x97 since London;
    SWAP9 = 0x98 since London;
    SWAP10 = 0x99 since London;
    SWAP11 = 0x9A since London;
    SWAP12 = 0x9B since London;
    SWAP13 = 0x9C since London;
    SWAP14 = 0x9D since London;
    SWAP15 = 0x9E since London;
    SWAP16 = 0x9F since London;

    LOG0 = 0xA0 since London;
    LOG1 = 0xA1 since London;
    LOG2 = 0xA2 since London;
    LOG3 = 0xA3 since London;
    LOG4 = 0xA4 since London;

    // System
    CREATE = 0xF0 since London;
    CALL = 0xF1 since London;
    CALLCODE = 0xF2 since London;
    RETURN = 0xF3 since London;
    DELEGATECALL = 0xF4 since London;
    CREATE2 = 0xF5 since London;
    STATICCALL = 0xFA since London;
    REVERT = 0xFD since London;
    INVALID = 0xFE since London;
    SELFDESTRUCT = 0xFF since London;
}

impl Opcode {
    /// Mnemonic, or `UNKNOWN` for undefined bytes.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match describe(self.0) {
            Some((name, _)) => name,
            None => "UNKNOWN",
        }
    }

    /// First spec that defines the opcode. `None` for undefined bytes and
    /// for INVALID, which is never executable.
    #[must_use]
    pub const fn introduced_in(self) -> Option<EvmSpec> {
        if self.0 == Self::INVALID.0 {
            return None;
        }
        match describe(self.0) {
            Some((_, spec)) => Some(spec),
            None => None,
        }
    }

    /// Immediate bytes following a PUSH; zero for everything else.
    #[must_use]
    pub const fn push_size(self) -> usize {
        if self.is_push() {
            (self.0 - Self::PUSH0.0) as usize
        } else {
            0
        }
    }

    /// PUSH0 through PUSH32.
    #[must_use]
    pub const fn is_push(self) -> bool {
        self.0 >= Self::PUSH0.0 && self.0 <= Self::PUSH32.0
    }

    /// Stack position a DUP copies, 1-based.
    #[must_use]
    pub const fn dup_depth(self) -> Option<usize> {
        if self.0 >= Self::DUP1.0 && self.0 <= Self::DUP16.0 {
            Some((self.0 - Self::DUP1.0) as usize + 1)
        } else {
            None
        }
    }

    /// Stack position a SWAP exchanges with the top, 1-based.
    #[must_use]
    pub const fn swap_depth(self) -> Option<usize> {
        if self.0 >= Self::SWAP1.0 && self.0 <= Self::SWAP16.0 {
            Some((self.0 - Self::SWAP1.0) as usize + 1)
        } else {
            None
        }
    }

    /// Topic count of a LOG opcode.
    #[must_use]
    pub const fn log_topics(self) -> Option<usize> {
        if self.0 >= Self::LOG0.0 && self.0 <= Self::LOG4.0 {
            Some((self.0 - Self::LOG0.0) as usize)
        } else {
            None
        }
    }

    /// Ends the frame.
    #[must_use]
    pub const fn is_terminating(self) -> bool {
        matches!(self.0, 0x00 | 0xF3 | 0xFD | 0xFE | 0xFF)
    }

    /// Not allowed in a static frame. CALL is only rejected when it moves
    /// value, which the interpreter checks separately.
    #[must_use]
    pub const fn is_state_modifying(self) -> bool {
        matches!(
            self.0,
            0x55 | 0x5D | 0xA0..=0xA4 | 0xF0 | 0xF5 | 0xFF
        )
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.0)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

// =============================================================================
// TESTS
// =============================================================================
