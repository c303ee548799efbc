//! # EVM Stack
//!
//! 256-bit word stack, at most 1024 items.

use crate::domain::value_objects::{Address, U256};
use crate::errors::VmError;

/// Maximum stack height.
pub const MAX_STACK_SIZE: usize = 1024;

/// Frame operand stack.
#[derive(Clone, Debug, Default)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(32),
        }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pushes a word.
    ///
    /// # Errors
    ///
    /// `StackOverflow` at 1024 items.
    pub fn push(&mut self, value: U256) -> Result<(), VmError> {
        if self.data.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pushes 1 for `true`, 0 for `false`.
    ///
    /// # Errors
    ///
    /// `StackOverflow` at 1024 items.
    pub fn push_bool(&mut self, value: bool) -> Result<(), VmError> {
        self.push(if value { U256::one() } else { U256::zero() })
    }

    /// Pushes an address, left-padded.
    ///
    /// # Errors
    ///
    /// `StackOverflow` at 1024 items.
    pub fn push_address(&mut self, address: &Address) -> Result<(), VmError> {
        self.push(address.to_word())
    }

    /// Pops the top word.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` when empty.
    pub fn pop(&mut self) -> Result<U256, VmError> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pops the top `N` words, top first.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` when fewer than `N` items are present. Nothing is
    /// popped in that case.
    pub fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], VmError> {
        if self.data.len() < N {
            return Err(VmError::StackUnderflow);
        }
        let mut out = [U256::zero(); N];
        for slot in &mut out {
            *slot = self.pop()?;
        }
        Ok(out)
    }

    /// Pops a word and keeps its low 20 bytes.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` when empty.
    pub fn pop_address(&mut self) -> Result<Address, VmError> {
        Ok(Address::from_word(self.pop()?))
    }

    /// Reads the word `depth` items below the top (0 = top).
    ///
    /// # Errors
    ///
    /// `StackUnderflow` when the stack is not that deep.
    pub fn peek(&self, depth: usize) -> Result<U256, VmError> {
        self.data
            .len()
            .checked_sub(depth + 1)
            .map(|index| self.data[index])
            .ok_or(VmError::StackUnderflow)
    }

    /// DUPn: pushes a copy of the n-th item (1 = top).
    ///
    /// # Errors
    ///
    /// `StackUnderflow` or `StackOverflow`.
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        let value = self.peek(n.saturating_sub(1))?;
        self.push(value)
    }

    /// SWAPn: exchanges the top with the item n below it.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` when fewer than n + 1 items are present.
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        let len = self.data.len();
        if n == 0 || n >= len {
            return Err(VmError::StackUnderflow);
        }
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }

    /// Items bottom first, for tracing.
    #[must_use]
    pub fn as_slice(&self) -> &[U256] {
        &self.data
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut stack = Stack::new();
        stack.push(U256::from(1)).unwrap();
        stack.push(U256::from(2)).unwrap();
        stack.push(U256::from(3)).unwrap();

        let [a, b] = stack.pop_n::<2>().unwrap();
        assert_eq!((a, b), (U256::from(3), U256::from(2)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_pop_n_underflow_leaves_stack_intact() {
        let mut stack = Stack::new();
        stack.push(U256::one()).unwrap();
        assert!(matches!(stack.pop_n::<2>(), Err(VmError::StackUnderflow)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_dup_and_swap_are_one_based() {
        let mut stack = Stack::new();
        stack.push(U256::from(1)).unwrap();
        stack.push(U256::from(2)).unwrap();

        stack.dup(2).unwrap();
        assert_eq!(stack.peek(0).unwrap(), U256::from(1));

        stack.swap(2).unwrap();
        assert_eq!(stack.as_slice(), &[U256::from(1), U256::from(2), U256::from(1)]);
        assert!(stack.swap(3).is_err());
    }

    #[test]
    fn test_address_roundtrip() {
        let mut stack = Stack::new();
        let addr = Address::from_low_u64(0x1234);
        stack.push_address(&addr).unwrap();
        assert_eq!(stack.pop_address().unwrap(), addr);
    }

    #[test]
    fn test_limits() {
        let mut stack = Stack::new();
        for i in 0..MAX_STACK_SIZE {
            stack.push(U256::from(i)).unwrap();
        }
        assert!(matches!(stack.push(U256::zero()), Err(VmError::StackOverflow)));
        assert!(matches!(Stack::new().pop(), Err(VmError::StackUnderflow)));
        assert!(Stack::new().peek(0).is_err());
    }
}
