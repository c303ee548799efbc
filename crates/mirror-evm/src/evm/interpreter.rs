//! # EVM Interpreter
//!
//! Synchronous bytecode interpreter for one simulated call. Every frame
//! runs against its own [`StackedUpdater`]: a frame that completes commits
//! into its parent, a frame that reverts or halts discards its journal.
//!
//! Calls to the token service, the exchange-rate and PRNG system
//! contracts, and ERC calls made on token addresses are routed to the
//! [`TokenPrecompileDispatcher`] instead of running bytecode.
//!
//! Cancellation is cooperative: the flag in [`Environment`] is checked
//! before every opcode, and a set flag unwinds the whole frame stack.

use crate::domain::entities::{Account, ExecutionContext, ExecutionResult, Log, VmConfig};
use crate::domain::services::{keccak256, precompiles};
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::errors::{ExceptionalHaltReason, PrecompileError, VmError};
use crate::evm::gas::{self, costs, GasContext, LedgerGasCalculator};
use crate::evm::memory::Memory;
use crate::evm::opcodes::Opcode;
use crate::evm::operations::{self, AddressCheck};
use crate::evm::precompiles::standard_precompile;
use crate::evm::stack::Stack;
use crate::evm::tracer::StepTracer;
use crate::evm::versions::VersionedOperationSet;
use crate::ports::outbound::{BlockHashOracle, PrngSeedSource};
use crate::precompile::{abi, CallContext, PrecompileCallResult, TokenPrecompileDispatcher};
use crate::state::{StackedUpdater, WorldStateView, WorldView};
use primitive_types::U512;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// Maximum execution steps to prevent infinite loops (safety limit).
pub const MAX_EXECUTION_STEPS: u64 = 10_000_000;

/// Everything a call reads but never mutates.
#[derive(Clone, Copy)]
pub struct Environment<'e> {
    /// Opcodes and rules of the resolved EVM version.
    pub operations: &'e VersionedOperationSet,
    /// Ledger-specific gas rules.
    pub gas_calculator: &'e LedgerGasCalculator,
    /// Token service, exchange-rate and PRNG system contracts.
    pub token_service: &'e TokenPrecompileDispatcher,
    /// BLOCKHASH source.
    pub block_hashes: &'e dyn BlockHashOracle,
    /// PREVRANDAO and PRNG seed source.
    pub prng: &'e dyn PrngSeedSource,
    /// Size and depth limits.
    pub config: &'e VmConfig,
    /// Set by the caller to abort between opcode steps.
    pub cancel: &'e AtomicBool,
    /// Deadline reported when the step limit trips.
    pub timeout_ms: u64,
}

/// How a child frame was entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// CALL, and the top-level message call.
    Call,
    /// CALLCODE.
    CallCode,
    /// DELEGATECALL.
    DelegateCall,
    /// STATICCALL.
    StaticCall,
}

impl CallKind {
    const fn has_value(self) -> bool {
        matches!(self, Self::Call | Self::CallCode)
    }
}

/// How a frame ended.
#[derive(Debug)]
pub enum FrameStatus {
    /// STOP, RETURN, SELFDESTRUCT or running off the end of the code.
    Completed,
    /// REVERT; unused gas is returned.
    Reverted,
    /// Exceptional halt.
    Halted(VmError),
}

/// Result of one frame as seen by its caller.
#[derive(Debug)]
pub struct FrameOutcome {
    /// How the frame ended.
    pub status: FrameStatus,
    /// RETURN or REVERT data; runtime code for a successful create.
    pub output: Bytes,
    /// Gas handed back to the caller.
    pub gas_left: u64,
    /// Refund counter accumulated by the frame and its children.
    pub refund: i64,
    /// Logs of committed frames.
    pub logs: Vec<Log>,
    /// Address of a successful create.
    pub created: Option<Address>,
}

impl FrameOutcome {
    fn completed(output: Bytes, gas_left: u64, refund: i64, logs: Vec<Log>) -> Self {
        Self {
            status: FrameStatus::Completed,
            output,
            gas_left,
            refund,
            logs,
            created: None,
        }
    }

    fn reverted(output: Bytes, gas_left: u64) -> Self {
        Self {
            status: FrameStatus::Reverted,
            output,
            gas_left,
            refund: 0,
            logs: Vec::new(),
            created: None,
        }
    }

    fn halted(err: VmError, gas_left: u64) -> Self {
        let gas_left = if err.consumes_all_gas() { 0 } else { gas_left };
        Self {
            status: FrameStatus::Halted(err),
            output: Bytes::new(),
            gas_left,
            refund: 0,
            logs: Vec::new(),
            created: None,
        }
    }

    /// True when the frame completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, FrameStatus::Completed)
    }
}

/// Per-frame machine state.
struct Frame<'c> {
    ctx: &'c ExecutionContext,
    code: &'c [u8],
    jump_dests: HashSet<usize>,
    pc: usize,
    stack: Stack,
    memory: Memory,
    gas_left: u64,
    refund: i64,
    logs: Vec<Log>,
    return_data: Bytes,
    output: Bytes,
    stopped: bool,
    reverted: bool,
}

impl<'c> Frame<'c> {
    fn new(ctx: &'c ExecutionContext, code: &'c [u8], memory_limit: usize) -> Self {
        Self {
            ctx,
            code,
            jump_dests: analyze_jump_dests(code),
            pc: 0,
            stack: Stack::new(),
            memory: Memory::with_limit(memory_limit),
            gas_left: ctx.gas_limit,
            refund: 0,
            logs: Vec::new(),
            return_data: Bytes::new(),
            output: Bytes::new(),
            stopped: false,
            reverted: false,
        }
    }

    fn charge(&mut self, gas: u64) -> Result<(), VmError> {
        if gas > self.gas_left {
            self.gas_left = 0;
            return Err(VmError::OutOfGas);
        }
        self.gas_left -= gas;
        Ok(())
    }

    /// Charges and performs the expansion covering `[offset, offset + size)`.
    /// A zero size touches nothing.
    fn expand(&mut self, offset: U256, size: U256) -> Result<(usize, usize), VmError> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let offset = memory_operand(offset)?;
        let size = memory_operand(size)?;
        let cost = self
            .memory
            .expansion_cost(offset, size)
            .map_err(|_| VmError::OutOfGas)?;
        self.charge(cost)?;
        self.memory
            .resize(offset, size)
            .map_err(|_| VmError::OutOfGas)?;
        Ok((offset, size))
    }

    fn copy_to_memory(
        &mut self,
        dest: U256,
        offset: U256,
        size: U256,
        source: &[u8],
    ) -> Result<(), VmError> {
        let (dest, len) = self.expand(dest, size)?;
        self.charge(gas::copy_gas_cost(len))?;
        let offset = if offset > U256::from(source.len()) {
            source.len()
        } else {
            offset.as_usize()
        };
        self.memory.store_padded(dest, source, offset, len);
        Ok(())
    }

    fn jump(&mut self, dest: U256) -> Result<(), VmError> {
        let target = usize::try_from(dest.low_u64()).unwrap_or(usize::MAX);
        if dest > U256::from(u32::MAX) || !self.jump_dests.contains(&target) {
            return Err(VmError::InvalidJump(target));
        }
        self.pc = target;
        Ok(())
    }
}

/// Runs one simulated call.
pub struct Interpreter<'e> {
    env: Environment<'e>,
    tracer: StepTracer,
    steps: u64,
    started: Instant,
}

impl<'e> Interpreter<'e> {
    /// Creates an interpreter for one call.
    #[must_use]
    pub fn new(env: Environment<'e>, tracer: StepTracer) -> Self {
        Self {
            env,
            tracer,
            steps: 0,
            started: Instant::now(),
        }
    }

    /// Executes a call or, when `is_create` is set, a deployment of
    /// `ctx.data`, over a fresh top-level updater on `view`. Nothing is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Only aborts: cancellation, the step limit, snapshot failures and
    /// pricing faults. Reverts and halts are reported in the result.
    pub fn transact(
        mut self,
        mut ctx: ExecutionContext,
        is_create: bool,
        view: &WorldStateView,
    ) -> Result<ExecutionResult, VmError> {
        let gas_limit = ctx.gas_limit;
        let intrinsic = self
            .env
            .gas_calculator
            .transaction_intrinsic_gas_cost(ctx.data.as_slice(), is_create);
        if intrinsic > gas_limit {
            return Ok(ExecutionResult::halted(
                ExceptionalHaltReason::InsufficientGas,
                Bytes::new(),
                gas_limit,
            ));
        }
        ctx.gas_limit = gas_limit - intrinsic;

        let mut root = view.updater();
        root.warm_account(ctx.origin);
        let outcome = if is_create {
            let init_code = std::mem::take(&mut ctx.data);
            let creator = ctx.origin;
            self.create_contract(creator, ctx, init_code.as_slice(), &mut root)?
        } else {
            root.warm_account(ctx.address);
            self.message_call(ctx, CallKind::Call, &mut root)?
        };
        root.commit();

        let gas_used = gas_limit.saturating_sub(outcome.gas_left);
        let mut result = match outcome.status {
            FrameStatus::Completed => {
                let refund = gas::capped_refund(gas_used, outcome.refund);
                let mut result = ExecutionResult::success(outcome.output, gas_used - refund);
                result.gas_refund = refund;
                result.logs = outcome.logs;
                result.created_address = outcome.created;
                result
            }
            FrameStatus::Reverted => ExecutionResult::revert(outcome.output, gas_used),
            FrameStatus::Halted(err) => match err.halt_reason() {
                Some(reason) => ExecutionResult::halted(reason, Bytes::new(), gas_used),
                None => ExecutionResult::failure(err.to_string(), gas_used),
            },
        };
        debug!(
            success = result.success,
            gas_used = result.gas_used,
            steps = self.steps,
            "call finished"
        );
        result.opcodes = self.tracer.into_steps();
        Ok(result)
    }

    /// Runs a message call in a child of `state`, committing it only when
    /// the callee completes.
    fn message_call(
        &mut self,
        ctx: ExecutionContext,
        kind: CallKind,
        state: &mut StackedUpdater<'_>,
    ) -> Result<FrameOutcome, VmError> {
        let mut child = state.updater();
        if kind == CallKind::Call {
            if let Err(err) = transfer(&mut child, &ctx.caller, &ctx.address, ctx.value) {
                child.revert();
                if err.is_abort() {
                    return Err(err);
                }
                return Ok(FrameOutcome::halted(err, ctx.gas_limit));
            }
        }
        let outcome = match self.run_target(&ctx, &mut child) {
            Ok(outcome) => outcome,
            Err(err) => {
                child.revert();
                return Err(err);
            }
        };
        if outcome.is_success() {
            child.commit();
        } else {
            child.revert();
        }
        Ok(outcome)
    }

    fn run_target(
        &mut self,
        ctx: &ExecutionContext,
        frame: &mut StackedUpdater<'_>,
    ) -> Result<FrameOutcome, VmError> {
        let target = ctx.code_address;
        let input = ctx.data.as_slice();
        if let Some(precompile) = standard_precompile(&target) {
            let result = precompile
                .execute(input, ctx.gas_limit)
                .map(|out| PrecompileCallResult {
                    gas_cost: out.gas_used,
                    output: out.output,
                    state_changed: false,
                });
            return precompile_outcome(&target, result, ctx.gas_limit);
        }

        let call = CallContext {
            sender: ctx.caller,
            timestamp: ctx.block.timestamp,
            gas_limit: ctx.gas_limit,
            is_static: ctx.is_static,
        };
        let service = self.env.token_service;
        let result = if target == precompiles::TOKEN_SERVICE {
            service.dispatch(input, frame, &call)
        } else if target == precompiles::EXCHANGE_RATE {
            service.dispatch_exchange_rate(input, &call)
        } else if target == precompiles::PRNG {
            service.dispatch_prng(input, self.env.prng.seed(&ctx.block), &call)
        } else if frame.redirect_token_calls() && frame.token(&target)?.is_some() {
            service.dispatch_redirect(&target, input, frame, &call)
        } else {
            let code = frame.code(&target)?;
            if code.is_empty() {
                return Ok(FrameOutcome::completed(Bytes::new(), ctx.gas_limit, 0, Vec::new()));
            }
            return self.execute_frame(ctx, code.as_slice(), frame);
        };
        precompile_outcome(&target, result, ctx.gas_limit)
    }

    /// Deploys `init_code` at the next sequencer address on behalf of
    /// `creator`.
    fn create_contract(
        &mut self,
        creator: Address,
        mut ctx: ExecutionContext,
        init_code: &[u8],
        state: &mut StackedUpdater<'_>,
    ) -> Result<FrameOutcome, VmError> {
        let address = state.new_contract_address(&creator)?;
        if let Some(account) = state.get_for_mutation(&creator)? {
            account.nonce = account.nonce.saturating_add(1);
        }
        ctx.caller = creator;
        ctx.address = address;
        ctx.code_address = address;
        trace!(%creator, %address, init_len = init_code.len(), "create");

        let mut child = state.updater();
        let mut account = Account::new_contract(address, Bytes::new());
        account.nonce = 1;
        child.create_account(account);
        if let Err(err) = transfer(&mut child, &creator, &address, ctx.value) {
            child.revert();
            if err.is_abort() {
                return Err(err);
            }
            return Ok(FrameOutcome::halted(err, ctx.gas_limit));
        }

        let mut outcome = match self.execute_frame(&ctx, init_code, &mut child) {
            Ok(outcome) => outcome,
            Err(err) => {
                child.revert();
                return Err(err);
            }
        };
        if !outcome.is_success() {
            child.revert();
            return Ok(outcome);
        }
        match self.deploy(&mut child, &address, &outcome.output, outcome.gas_left) {
            Ok(cost) => {
                outcome.gas_left -= cost;
                outcome.created = Some(address);
                child.commit();
                Ok(outcome)
            }
            Err(err) if err.is_abort() => {
                child.revert();
                Err(err)
            }
            Err(err) => {
                child.revert();
                Ok(FrameOutcome::halted(err, outcome.gas_left))
            }
        }
    }

    fn deploy(
        &self,
        frame: &mut StackedUpdater<'_>,
        address: &Address,
        code: &Bytes,
        gas_left: u64,
    ) -> Result<u64, VmError> {
        let max = self.env.config.max_code_size;
        if code.len() > max {
            return Err(VmError::CodeSizeExceeded {
                size: code.len(),
                max,
            });
        }
        if code.as_slice().first() == Some(&0xEF) {
            return Err(VmError::InvalidCodePrefix);
        }
        let cost = self.env.gas_calculator.code_deposit_gas_cost(code.len());
        if cost > gas_left {
            return Err(VmError::OutOfGas);
        }
        if let Some(account) = frame.get_for_mutation(address)? {
            account.code = code.clone();
        }
        Ok(cost)
    }

    fn execute_frame(
        &mut self,
        ctx: &ExecutionContext,
        code: &[u8],
        state: &mut StackedUpdater<'_>,
    ) -> Result<FrameOutcome, VmError> {
        let mut frame = Frame::new(ctx, code, self.env.config.max_memory_size);
        trace!(depth = ctx.depth, address = %ctx.address, gas = ctx.gas_limit, "frame started");

        while !frame.stopped && frame.pc < code.len() {
            if let Err(err) = self.step(&mut frame, state) {
                if err.is_abort() {
                    return Err(err);
                }
                debug!(depth = ctx.depth, address = %ctx.address, %err, "frame halted");
                match err.halt_reason() {
                    Some(reason) => self.tracer.record_reason(reason.to_string()),
                    None => self.tracer.record_reason(err.to_string()),
                }
                return Ok(FrameOutcome::halted(err, frame.gas_left));
            }
        }

        if frame.reverted {
            return Ok(FrameOutcome::reverted(frame.output, frame.gas_left));
        }
        Ok(FrameOutcome::completed(
            frame.output,
            frame.gas_left,
            frame.refund,
            frame.logs,
        ))
    }

    fn step(
        &mut self,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
    ) -> Result<(), VmError> {
        if self.env.cancel.load(Ordering::Relaxed) {
            return Err(VmError::Cancelled);
        }
        self.steps += 1;
        if self.steps > MAX_EXECUTION_STEPS {
            return Err(VmError::Timeout {
                elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
                max_ms: self.env.timeout_ms,
            });
        }

        let pc = frame.pc;
        let op = Opcode(frame.code[pc]);
        if !self.env.operations.is_enabled(op) {
            return Err(VmError::InvalidOpcode(op.0));
        }
        if frame.ctx.is_static && op.is_state_modifying() {
            return Err(VmError::WriteInStaticContext);
        }

        let gas_before = frame.gas_left;
        let static_cost = gas::static_cost(op);
        let step = self.tracer.record(
            pc,
            op,
            gas_before,
            static_cost,
            frame.ctx.depth,
            &frame.stack,
            &frame.memory,
        );
        frame.charge(static_cost)?;
        frame.pc += 1;
        let result = self.execute(op, frame, state);
        self.tracer
            .amend_cost(step, gas_before.saturating_sub(frame.gas_left));
        result
    }

    #[allow(clippy::too_many_lines)]
    fn execute(
        &mut self,
        op: Opcode,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
    ) -> Result<(), VmError> {
        if op.is_push() {
            let size = op.push_size();
            let start = frame.pc.min(frame.code.len());
            let end = (frame.pc + size).min(frame.code.len());
            let mut word = [0u8; 32];
            word[32 - size..32 - size + (end - start)].copy_from_slice(&frame.code[start..end]);
            frame.pc += size;
            return frame.stack.push(U256::from_big_endian(&word));
        }
        if let Some(n) = op.dup_depth() {
            return frame.stack.dup(n);
        }
        if let Some(n) = op.swap_depth() {
            return frame.stack.swap(n);
        }
        if let Some(topics) = op.log_topics() {
            return self.log(frame, topics);
        }

        let ctx = frame.ctx;
        match op {
            Opcode::STOP => frame.stopped = true,

            // Arithmetic
            Opcode::ADD => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a.overflowing_add(b).0)?;
            }
            Opcode::MUL => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a.overflowing_mul(b).0)?;
            }
            Opcode::SUB => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a.overflowing_sub(b).0)?;
            }
            Opcode::DIV => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame
                    .stack
                    .push(if b.is_zero() { U256::zero() } else { a / b })?;
            }
            Opcode::SDIV => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(if b.is_zero() {
                    U256::zero()
                } else {
                    signed_div(a, b)
                })?;
            }
            Opcode::MOD => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame
                    .stack
                    .push(if b.is_zero() { U256::zero() } else { a % b })?;
            }
            Opcode::SMOD => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(if b.is_zero() {
                    U256::zero()
                } else {
                    signed_mod(a, b)
                })?;
            }
            Opcode::ADDMOD => {
                let [a, b, n] = frame.stack.pop_n::<3>()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    u512_to_u256((u256_to_u512(a) + u256_to_u512(b)) % u256_to_u512(n))
                };
                frame.stack.push(result)?;
            }
            Opcode::MULMOD => {
                let [a, b, n] = frame.stack.pop_n::<3>()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    u512_to_u256((u256_to_u512(a) * u256_to_u512(b)) % u256_to_u512(n))
                };
                frame.stack.push(result)?;
            }
            Opcode::EXP => {
                let [base, exponent] = frame.stack.pop_n::<2>()?;
                frame.charge(gas::exp_gas_cost(exponent).saturating_sub(costs::EXP))?;
                frame.stack.push(exp_by_squaring(base, exponent))?;
            }
            Opcode::SIGNEXTEND => {
                let [b, x] = frame.stack.pop_n::<2>()?;
                frame.stack.push(sign_extend(b, x))?;
            }

            // Comparison and bitwise
            Opcode::LT => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push_bool(a < b)?;
            }
            Opcode::GT => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push_bool(a > b)?;
            }
            Opcode::SLT => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push_bool(signed_lt(a, b))?;
            }
            Opcode::SGT => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push_bool(signed_lt(b, a))?;
            }
            Opcode::EQ => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push_bool(a == b)?;
            }
            Opcode::ISZERO => {
                let a = frame.stack.pop()?;
                frame.stack.push_bool(a.is_zero())?;
            }
            Opcode::AND => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a & b)?;
            }
            Opcode::OR => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a | b)?;
            }
            Opcode::XOR => {
                let [a, b] = frame.stack.pop_n::<2>()?;
                frame.stack.push(a ^ b)?;
            }
            Opcode::NOT => {
                let a = frame.stack.pop()?;
                frame.stack.push(!a)?;
            }
            Opcode::BYTE => {
                let [i, x] = frame.stack.pop_n::<2>()?;
                let result = if i < U256::from(32) {
                    U256::from(x.byte(31 - i.as_usize()))
                } else {
                    U256::zero()
                };
                frame.stack.push(result)?;
            }
            Opcode::SHL => {
                let [shift, value] = frame.stack.pop_n::<2>()?;
                frame.stack.push(if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.as_usize()
                })?;
            }
            Opcode::SHR => {
                let [shift, value] = frame.stack.pop_n::<2>()?;
                frame.stack.push(if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.as_usize()
                })?;
            }
            Opcode::SAR => {
                let [shift, value] = frame.stack.pop_n::<2>()?;
                frame.stack.push(sar(value, shift))?;
            }

            Opcode::KECCAK256 => {
                let [offset, size] = frame.stack.pop_n::<2>()?;
                let (offset, len) = frame.expand(offset, size)?;
                frame.charge(gas::keccak256_word_cost(len))?;
                let hash = keccak256(&frame.memory.slice(offset, len));
                frame.stack.push(hash.to_word())?;
            }

            // Environment
            Opcode::ADDRESS => frame.stack.push_address(&ctx.address)?,
            Opcode::BALANCE => {
                let address = frame.stack.pop_address()?;
                let balance = if self.admit_target(frame, state, &address)? {
                    state.balance(&address)?
                } else {
                    U256::zero()
                };
                frame.stack.push(balance)?;
            }
            Opcode::ORIGIN => frame.stack.push_address(&ctx.origin)?,
            Opcode::CALLER => frame.stack.push_address(&ctx.caller)?,
            Opcode::CALLVALUE => frame.stack.push(ctx.value)?,
            Opcode::CALLDATALOAD => {
                let offset = frame.stack.pop()?;
                frame.stack.push(read_word(ctx.data.as_slice(), offset))?;
            }
            Opcode::CALLDATASIZE => frame.stack.push(U256::from(ctx.data.len()))?,
            Opcode::CALLDATACOPY => {
                let [dest, offset, size] = frame.stack.pop_n::<3>()?;
                frame.copy_to_memory(dest, offset, size, ctx.data.as_slice())?;
            }
            Opcode::CODESIZE => frame.stack.push(U256::from(frame.code.len()))?,
            Opcode::CODECOPY => {
                let [dest, offset, size] = frame.stack.pop_n::<3>()?;
                let code = frame.code;
                frame.copy_to_memory(dest, offset, size, code)?;
            }
            Opcode::GASPRICE => frame.stack.push(ctx.gas_price)?,
            Opcode::EXTCODESIZE => {
                let address = frame.stack.pop_address()?;
                let size = if self.admit_target(frame, state, &address)? {
                    state.code(&address)?.len()
                } else {
                    0
                };
                frame.stack.push(U256::from(size))?;
            }
            Opcode::EXTCODECOPY => {
                let address = frame.stack.pop_address()?;
                let [dest, offset, size] = frame.stack.pop_n::<3>()?;
                let code = if self.admit_target(frame, state, &address)? {
                    state.code(&address)?
                } else {
                    Bytes::new()
                };
                frame.copy_to_memory(dest, offset, size, code.as_slice())?;
            }
            Opcode::RETURNDATASIZE => frame.stack.push(U256::from(frame.return_data.len()))?,
            Opcode::RETURNDATACOPY => {
                let [dest, offset, size] = frame.stack.pop_n::<3>()?;
                let available = frame.return_data.len();
                let end = offset.checked_add(size);
                if end.map_or(true, |end| end > U256::from(available)) {
                    return Err(VmError::ReturnDataOutOfBounds {
                        offset: usize::try_from(offset.low_u64()).unwrap_or(usize::MAX),
                        size: usize::try_from(size.low_u64()).unwrap_or(usize::MAX),
                        available,
                    });
                }
                let data = frame.return_data.clone();
                frame.copy_to_memory(dest, offset, size, data.as_slice())?;
            }
            Opcode::EXTCODEHASH => {
                let address = frame.stack.pop_address()?;
                let hash = if self.admit_target(frame, state, &address)? {
                    state
                        .get(&address)?
                        .filter(|account| !account.is_empty())
                        .map_or(U256::zero(), |account| account.code_hash().to_word())
                } else {
                    U256::zero()
                };
                frame.stack.push(hash)?;
            }

            // Block
            Opcode::BLOCKHASH => {
                let number = frame.stack.pop()?;
                let hash = if number > U256::from(u64::MAX) {
                    U256::zero()
                } else {
                    self.env
                        .block_hashes
                        .block_hash(number.as_u64(), ctx.block.number)
                        .map_or(U256::zero(), |hash| hash.to_word())
                };
                frame.stack.push(hash)?;
            }
            Opcode::COINBASE => frame.stack.push_address(&ctx.block.coinbase)?,
            Opcode::TIMESTAMP => frame
                .stack
                .push(U256::from(ctx.block.timestamp.seconds().max(0).unsigned_abs()))?,
            Opcode::NUMBER => frame.stack.push(U256::from(ctx.block.number))?,
            Opcode::PREVRANDAO => {
                let value = if self.env.operations.spec().has_prevrandao() {
                    self.env.prng.seed(&ctx.block).to_word()
                } else {
                    U256::zero()
                };
                frame.stack.push(value)?;
            }
            Opcode::GASLIMIT => frame.stack.push(U256::from(ctx.block.gas_limit))?,
            Opcode::CHAINID => frame.stack.push(U256::from(ctx.block.chain_id))?,
            Opcode::SELFBALANCE => frame.stack.push(state.balance(&ctx.address)?)?,
            Opcode::BASEFEE => frame.stack.push(ctx.block.base_fee)?,
            Opcode::BLOBHASH => {
                frame.stack.pop()?;
                frame.stack.push(U256::zero())?;
            }
            Opcode::BLOBBASEFEE => frame.stack.push(U256::zero())?,

            // Stack, memory, storage, flow
            Opcode::POP => {
                frame.stack.pop()?;
            }
            Opcode::MLOAD => {
                let offset = frame.stack.pop()?;
                let (offset, _) = frame.expand(offset, U256::from(32))?;
                let word = frame.memory.load_word(offset);
                frame.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::MSTORE => {
                let [offset, value] = frame.stack.pop_n::<2>()?;
                let (offset, _) = frame.expand(offset, U256::from(32))?;
                let mut word = [0u8; 32];
                value.to_big_endian(&mut word);
                frame.memory.store_word(offset, &word);
            }
            Opcode::MSTORE8 => {
                let [offset, value] = frame.stack.pop_n::<2>()?;
                let (offset, _) = frame.expand(offset, U256::one())?;
                frame.memory.store_byte(offset, value.byte(0));
            }
            Opcode::SLOAD => {
                let key = frame.stack.pop()?;
                let slot = StorageKey::from_u256(key);
                let was_warm = state.warm_slot(ctx.address, slot);
                frame.charge(gas::sload_cost(was_warm))?;
                let value = state.storage(&ctx.address, &slot)?.to_u256();
                self.tracer.record_storage(key, value);
                frame.stack.push(value)?;
            }
            Opcode::SSTORE => {
                if frame.gas_left <= costs::SSTORE_SENTRY {
                    return Err(VmError::OutOfGas);
                }
                let [key, value] = frame.stack.pop_n::<2>()?;
                let slot = StorageKey::from_u256(key);
                let original = state.original_storage(&ctx.address, &slot)?.to_u256();
                let current = state.storage(&ctx.address, &slot)?.to_u256();
                let was_warm = state.warm_slot(ctx.address, slot);
                let (cost, refund) = gas::sstore_cost(original, current, value, was_warm);
                frame.charge(cost)?;
                frame.refund += refund;
                state.set_storage(ctx.address, slot, StorageValue::from_u256(value));
                self.tracer.record_storage(key, value);
            }
            Opcode::JUMP => {
                let dest = frame.stack.pop()?;
                frame.jump(dest)?;
            }
            Opcode::JUMPI => {
                let [dest, condition] = frame.stack.pop_n::<2>()?;
                if !condition.is_zero() {
                    frame.jump(dest)?;
                }
            }
            Opcode::PC => frame.stack.push(U256::from(frame.pc - 1))?,
            Opcode::MSIZE => frame.stack.push(U256::from(frame.memory.len()))?,
            Opcode::GAS => frame.stack.push(U256::from(frame.gas_left))?,
            Opcode::JUMPDEST => {}
            Opcode::TLOAD => {
                let key = frame.stack.pop()?;
                let value = state.transient(&ctx.address, &StorageKey::from_u256(key));
                frame.stack.push(value.to_u256())?;
            }
            Opcode::TSTORE => {
                let [key, value] = frame.stack.pop_n::<2>()?;
                state.set_transient(
                    ctx.address,
                    StorageKey::from_u256(key),
                    StorageValue::from_u256(value),
                );
            }
            Opcode::MCOPY => {
                let [dest, src, size] = frame.stack.pop_n::<3>()?;
                let (_, len) = frame.expand(dest.max(src), size)?;
                frame.charge(gas::copy_gas_cost(len))?;
                if len > 0 {
                    frame.memory.copy_within(dest.as_usize(), src.as_usize(), len);
                }
            }

            // System
            Opcode::CREATE => self.create(frame, state, false)?,
            Opcode::CREATE2 => self.create(frame, state, true)?,
            Opcode::CALL => self.call(frame, state, CallKind::Call)?,
            Opcode::CALLCODE => self.call(frame, state, CallKind::CallCode)?,
            Opcode::DELEGATECALL => self.call(frame, state, CallKind::DelegateCall)?,
            Opcode::STATICCALL => self.call(frame, state, CallKind::StaticCall)?,
            Opcode::RETURN | Opcode::REVERT => {
                let [offset, size] = frame.stack.pop_n::<2>()?;
                let (offset, len) = frame.expand(offset, size)?;
                frame.output = Bytes::from(frame.memory.slice(offset, len));
                frame.reverted = op == Opcode::REVERT;
                frame.stopped = true;
            }
            Opcode::SELFDESTRUCT => self.self_destruct(frame, state)?,

            _ => return Err(VmError::InvalidOpcode(op.0)),
        }
        Ok(())
    }

    /// Applies the version's address rule to an account operand and charges
    /// the access. `false` means a system account: the operation answers
    /// zero at the warm-read price.
    fn admit_target(
        &self,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
        address: &Address,
    ) -> Result<bool, VmError> {
        match operations::check_address(&*state, self.env.operations.address_rule(), address)? {
            AddressCheck::SystemAccount => {
                frame.charge(costs::WARM_STORAGE_READ)?;
                Ok(false)
            }
            AddressCheck::Invalid => Err(VmError::Halt(
                ExceptionalHaltReason::InvalidSolidityAddress,
            )),
            AddressCheck::Regular => {
                let was_warm = state.warm_account(*address);
                frame.charge(gas::account_access_cost(was_warm))?;
                Ok(true)
            }
        }
    }

    fn log(&mut self, frame: &mut Frame<'_>, topics: usize) -> Result<(), VmError> {
        let [offset, size] = frame.stack.pop_n::<2>()?;
        let mut hashes = Vec::with_capacity(topics);
        for _ in 0..topics {
            let mut word = [0u8; 32];
            frame.stack.pop()?.to_big_endian(&mut word);
            hashes.push(Hash::new(word));
        }
        let (offset, len) = frame.expand(offset, size)?;
        let ctx = frame.ctx;
        let cost = self.env.gas_calculator.log_operation_gas_cost(
            &GasContext::contract_call(ctx.block.timestamp, ctx.gas_price),
            len,
            topics,
        )?;
        frame.charge(cost)?;
        let data = Bytes::from(frame.memory.slice(offset, len));
        frame.logs.push(Log::new(ctx.address, hashes, data));
        Ok(())
    }

    fn call(
        &mut self,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
        kind: CallKind,
    ) -> Result<(), VmError> {
        let ctx = frame.ctx;
        let requested = frame.stack.pop()?;
        let target = frame.stack.pop_address()?;
        let value = if kind.has_value() {
            frame.stack.pop()?
        } else {
            U256::zero()
        };
        let [in_offset, in_size, out_offset, out_size] = frame.stack.pop_n::<4>()?;
        if ctx.is_static && kind == CallKind::Call && !value.is_zero() {
            return Err(VmError::WriteInStaticContext);
        }

        let (in_offset, in_len) = frame.expand(in_offset, in_size)?;
        let (out_offset, out_len) = frame.expand(out_offset, out_size)?;
        frame.return_data = Bytes::new();
        if kind == CallKind::DelegateCall {
            if !self.admit_target(frame, state, &target)? {
                return frame.stack.push(U256::zero());
            }
        } else {
            let was_warm = state.warm_account(target);
            frame.charge(gas::account_access_cost(was_warm))?;
        }

        let transfers_value = kind.has_value() && !value.is_zero();
        if transfers_value {
            frame.charge(costs::CALL_VALUE)?;
            if kind == CallKind::Call && !operations::address_exists(&*state, &target)? {
                frame.charge(costs::NEW_ACCOUNT)?;
            }
        }

        let forwarded = gas::call_gas_forwarded(frame.gas_left, requested);
        frame.charge(forwarded)?;
        let depth_exceeded = ctx.depth >= self.env.config.max_call_depth;
        if depth_exceeded || (transfers_value && state.balance(&ctx.address)? < value) {
            trace!(depth = ctx.depth, %target, "call skipped");
            frame.gas_left += forwarded;
            return frame.stack.push(U256::zero());
        }
        let gas = if transfers_value {
            forwarded + costs::CALL_STIPEND
        } else {
            forwarded
        };

        let input = Bytes::from(frame.memory.slice(in_offset, in_len));
        let child = match kind {
            CallKind::Call => ctx.child_call(target, value, input, gas),
            CallKind::CallCode => ctx.child_callcode(target, value, input, gas),
            CallKind::DelegateCall => ctx.child_delegatecall(target, input, gas),
            CallKind::StaticCall => ctx.child_staticcall(target, input, gas),
        };
        let outcome = self.message_call(child, kind, state)?;

        frame.gas_left += outcome.gas_left;
        let copied = out_len.min(outcome.output.len());
        frame
            .memory
            .store_padded(out_offset, outcome.output.as_slice(), 0, copied);
        let success = outcome.is_success();
        if success {
            frame.refund += outcome.refund;
            frame.logs.extend(outcome.logs);
        }
        frame.return_data = outcome.output;
        frame.stack.push_bool(success)
    }

    fn create(
        &mut self,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
        salted: bool,
    ) -> Result<(), VmError> {
        let ctx = frame.ctx;
        let [value, offset, size] = frame.stack.pop_n::<3>()?;
        // The salt is accepted for CREATE2 but addresses come from the
        // entity sequencer.
        if salted {
            frame.stack.pop()?;
        }
        let (offset, len) = frame.expand(offset, size)?;
        if self.env.operations.spec().limits_init_code() {
            let max = self.env.config.max_init_code_size;
            if len > max {
                return Err(VmError::InitCodeSizeExceeded { size: len, max });
            }
            frame.charge(gas::init_code_cost(len))?;
        }
        if salted {
            frame.charge(gas::keccak256_word_cost(len))?;
        }

        frame.return_data = Bytes::new();
        let depth_exceeded = ctx.depth >= self.env.config.max_call_depth;
        if depth_exceeded || state.balance(&ctx.address)? < value {
            return frame.stack.push(U256::zero());
        }
        let gas = frame.gas_left - frame.gas_left / 64;
        frame.charge(gas)?;

        let init_code = frame.memory.slice(offset, len);
        let child = ctx.child_create(Address::ZERO, value, gas);
        let outcome = self.create_contract(ctx.address, child, &init_code, state)?;
        frame.gas_left += outcome.gas_left;
        match (outcome.status, outcome.created) {
            (FrameStatus::Completed, Some(address)) => {
                frame.refund += outcome.refund;
                frame.logs.extend(outcome.logs);
                frame.stack.push_address(&address)
            }
            (FrameStatus::Reverted, _) => {
                frame.return_data = outcome.output;
                frame.stack.push(U256::zero())
            }
            _ => frame.stack.push(U256::zero()),
        }
    }

    fn self_destruct(
        &mut self,
        frame: &mut Frame<'_>,
        state: &mut StackedUpdater<'_>,
    ) -> Result<(), VmError> {
        let ctx = frame.ctx;
        let beneficiary = frame.stack.pop_address()?;
        if let Some(reason) =
            operations::self_destruct_halt(&*state, self.env.operations, &ctx.address, &beneficiary)?
        {
            return Err(VmError::Halt(reason));
        }

        let was_warm = state.warm_account(beneficiary);
        let balance = state.balance(&ctx.address)?;
        let beneficiary_empty = state
            .get(&beneficiary)?
            .map_or(true, |account| account.is_empty());
        let mut cost = self
            .env
            .gas_calculator
            .self_destruct_operation_gas_cost(beneficiary_empty, balance);
        if !was_warm {
            cost += costs::COLD_ACCOUNT_ACCESS;
        }
        frame.charge(cost)?;

        transfer(state, &ctx.address, &beneficiary, balance)?;
        if !self.env.operations.self_destruct().eip6780
            || state.is_created_in_transaction(&ctx.address)
        {
            state.delete_account(&ctx.address)?;
        }
        frame.stopped = true;
        Ok(())
    }
}

/// Moves `value` tinybars between accounts of `frame`. A missing recipient
/// is created as an empty EOA; tokens cannot receive value.
fn transfer(
    frame: &mut StackedUpdater<'_>,
    from: &Address,
    to: &Address,
    value: U256,
) -> Result<(), VmError> {
    if value.is_zero() || from == to {
        return Ok(());
    }
    let available = frame.balance(from)?;
    if available < value {
        return Err(VmError::InsufficientBalance {
            required: value,
            available,
        });
    }
    if let Some(sender) = frame.get_for_mutation(from)? {
        sender.balance -= value;
    }
    if let Some(recipient) = frame.get_for_mutation(to)? {
        recipient.balance = recipient.balance.saturating_add(value);
    } else if frame.exists(to)? {
        return Err(VmError::Halt(ExceptionalHaltReason::InvalidSolidityAddress));
    } else {
        frame.create_account(Account::new_eoa(*to, value));
    }
    Ok(())
}

/// Turns a precompile result into a frame outcome. World state failures
/// end the whole call.
fn precompile_outcome(
    target: &Address,
    result: Result<PrecompileCallResult, PrecompileError>,
    gas_limit: u64,
) -> Result<FrameOutcome, VmError> {
    let err = match result {
        Ok(result) => {
            return Ok(FrameOutcome::completed(
                result.output,
                gas_limit.saturating_sub(result.gas_cost),
                0,
                Vec::new(),
            ))
        }
        Err(err) => VmError::from(err),
    };
    debug!(%target, %err, "precompile call failed");
    match err {
        err if err.is_abort() => Err(err),
        VmError::Revert(reason) => Ok(FrameOutcome::reverted(revert_payload(&reason), gas_limit)),
        other => Ok(FrameOutcome::halted(other, gas_limit)),
    }
}

/// `Error(string)` revert data.
fn revert_payload(reason: &str) -> Bytes {
    Bytes::from(abi::encode_call(
        abi::selector("Error(string)"),
        &[abi::Token::String(reason.to_string())],
    ))
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Memory offsets and sizes above 4 GiB can never be paid for.
fn memory_operand(value: U256) -> Result<usize, VmError> {
    if value > U256::from(u32::MAX) {
        return Err(VmError::OutOfGas);
    }
    Ok(value.as_usize())
}

/// 32 bytes of `data` from `offset`, zero-padded.
fn read_word(data: &[u8], offset: U256) -> U256 {
    let mut word = [0u8; 32];
    if offset < U256::from(data.len()) {
        let start = offset.as_usize();
        let end = (start + 32).min(data.len());
        word[..end - start].copy_from_slice(&data[start..end]);
    }
    U256::from_big_endian(&word)
}

/// Analyze bytecode to find valid JUMPDEST locations.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        let op = Opcode(code[i]);
        if op == Opcode::JUMPDEST {
            dests.insert(i);
        }
        // Skip PUSH data bytes
        i += 1 + op.push_size();
    }
    dests
}

fn sign_extend(b: U256, x: U256) -> U256 {
    if b >= U256::from(31) {
        return x;
    }
    let bit = b.as_usize() * 8 + 7;
    let mask = (U256::one() << bit) - U256::one();
    if x.bit(bit) {
        x | !mask
    } else {
        x & mask
    }
}

/// Signed less than comparison.
fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if value.bit(255) {
        twos_complement(value)
    } else {
        value
    }
}

/// Signed division.
fn signed_div(a: U256, b: U256) -> U256 {
    let result = abs(a) / abs(b);
    if a.bit(255) == b.bit(255) {
        result
    } else {
        twos_complement(result)
    }
}

/// Signed modulo; the result takes the sign of the dividend.
fn signed_mod(a: U256, b: U256) -> U256 {
    let result = abs(a) % abs(b);
    if a.bit(255) {
        twos_complement(result)
    } else {
        result
    }
}

/// Arithmetic shift right.
fn sar(value: U256, shift: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.as_usize();
    let shifted = value >> shift;
    if negative && shift > 0 {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

/// Exponentiation by squaring.
fn exp_by_squaring(base: U256, mut exp: U256) -> U256 {
    let mut result = U256::one();
    let mut base = base;
    while !exp.is_zero() {
        if exp.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exp >>= 1;
        base = base.overflowing_mul(base).0;
    }
    result
}

fn u256_to_u512(value: U256) -> U512 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes[32..]);
    U512::from_big_endian(&bytes)
}

fn u512_to_u256(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

// =============================================================================
// TESTS
// =============================================================================
