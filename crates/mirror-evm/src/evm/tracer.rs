//! # Opcode Tracer
//!
//! Records one [`OpcodeStep`] per executed instruction when a call asks
//! for an OPCODE trace. An OPERATION tracer records nothing.

use super::memory::Memory;
use super::opcodes::Opcode;
use super::stack::Stack;
use crate::domain::entities::{OpcodeStep, TraceOptions, TracerType};
use crate::domain::value_objects::U256;

/// Step recorder shared by every frame of one call.
#[derive(Clone, Debug, Default)]
pub struct StepTracer {
    enabled: bool,
    options: TraceOptions,
    steps: Vec<OpcodeStep>,
}

impl StepTracer {
    /// Tracer for `kind` capturing what `options` asks for.
    #[must_use]
    pub fn new(kind: TracerType, options: TraceOptions) -> Self {
        Self {
            enabled: kind == TracerType::Opcode,
            options,
            steps: Vec::new(),
        }
    }

    /// Tracer that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// True for OPCODE tracers.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a step before it executes.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        pc: usize,
        op: Opcode,
        gas: u64,
        gas_cost: u64,
        depth: u16,
        stack: &Stack,
        memory: &Memory,
    ) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        self.steps.push(OpcodeStep {
            pc,
            op: op.name().to_string(),
            gas,
            gas_cost,
            depth,
            stack: if self.options.stack {
                stack.as_slice().to_vec()
            } else {
                Vec::new()
            },
            memory: if self.options.memory {
                memory.words()
            } else {
                Vec::new()
            },
            storage: Vec::new(),
            reason: None,
        });
        Some(self.steps.len() - 1)
    }

    /// Replaces the cost of a recorded step once its dynamic part is known.
    pub fn amend_cost(&mut self, step: Option<usize>, gas_cost: u64) {
        if let Some(step) = step.and_then(|i| self.steps.get_mut(i)) {
            step.gas_cost = gas_cost;
        }
    }

    /// Attaches the slot read or written by the current step.
    pub fn record_storage(&mut self, key: U256, value: U256) {
        if !self.enabled || !self.options.storage {
            return;
        }
        if let Some(step) = self.steps.last_mut() {
            step.storage.push((key, value));
        }
    }

    /// Marks the current step as the one that ended its frame.
    pub fn record_reason(&mut self, reason: impl Into<String>) {
        if !self.enabled {
            return;
        }
        if let Some(step) = self.steps.last_mut() {
            step.reason = Some(reason.into());
        }
    }

    /// Recorded steps.
    #[must_use]
    pub fn steps(&self) -> &[OpcodeStep] {
        &self.steps
    }

    /// Takes the recorded steps.
    #[must_use]
    pub fn into_steps(self) -> Vec<OpcodeStep> {
        self.steps
    }
}
