//! # EVM
//!
//! Bytecode execution for historical simulation.
//!
//! ## Components
//!
//! - `opcodes.rs` - Opcode table and the hard fork each opcode arrived in
//! - `versions.rs` - Versioned operation sets and the version registry
//! - `interpreter.rs` - Frame execution and call routing
//! - `gas.rs` - Standard costs and the ledger gas calculator
//! - `operations.rs` - Address checks and SELFDESTRUCT rules
//! - `memory.rs`, `stack.rs` - Machine state
//! - `precompiles/` - Standard precompiled contracts
//! - `prng.rs` - PREVRANDAO and PRNG seed
//! - `tracer.rs` - Opcode step recording

pub mod gas;
pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod operations;
pub mod precompiles;
pub mod prng;
pub mod stack;
pub mod tracer;
pub mod versions;

pub use gas::{GasContext, LedgerGasCalculator};
pub use interpreter::{CallKind, Environment, FrameOutcome, FrameStatus, Interpreter};
pub use memory::Memory;
pub use opcodes::Opcode;
pub use prng::RunningHashSeed;
pub use stack::Stack;
pub use tracer::StepTracer;
pub use versions::{EvmSpec, VersionRegistry, VersionedOperationSet};
