//! # EVM Memory
//!
//! Byte-addressable, word-aligned frame memory. Growth is priced before it
//! happens: callers ask [`Memory::expansion_cost`], charge the gas, then
//! [`Memory::resize`].

use crate::domain::value_objects::Hash;
use crate::errors::VmError;

/// Default upper bound on one frame's memory.
pub const MAX_MEMORY_SIZE: usize = 16 * 1024 * 1024;

/// Word size in bytes.
pub const WORD_SIZE: usize = 32;

/// Frame memory.
#[derive(Clone, Debug)]
pub struct Memory {
    data: Vec<u8>,
    limit: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Empty memory with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_MEMORY_SIZE)
    }

    /// Empty memory with a custom limit.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Size in bytes, always a multiple of 32.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing was ever touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in words.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.data.len() / WORD_SIZE
    }

    /// Gas to cover `[offset, offset + size)`. Empty ranges never expand.
    ///
    /// # Errors
    ///
    /// `MemoryLimitExceeded` when the range ends past the limit.
    pub fn expansion_cost(&self, offset: usize, size: usize) -> Result<u64, VmError> {
        let new_words = self.required_words(offset, size)?;
        Ok(memory_expansion_cost(self.word_size(), new_words))
    }

    /// Grows memory to cover `[offset, offset + size)`.
    ///
    /// # Errors
    ///
    /// `MemoryLimitExceeded` when the range ends past the limit.
    pub fn resize(&mut self, offset: usize, size: usize) -> Result<(), VmError> {
        let words = self.required_words(offset, size)?;
        if words > self.word_size() {
            self.data.resize(words * WORD_SIZE, 0);
        }
        Ok(())
    }

    fn required_words(&self, offset: usize, size: usize) -> Result<usize, VmError> {
        if size == 0 {
            return Ok(self.word_size());
        }
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= self.limit)
            .ok_or(VmError::MemoryLimitExceeded {
                requested: offset.saturating_add(size),
                max: self.limit,
            })?;
        Ok(end.div_ceil(WORD_SIZE).max(self.word_size()))
    }

    /// Reads a word. Bytes past the end read as zero.
    #[must_use]
    pub fn load_word(&self, offset: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        self.read_into(offset, &mut word);
        word
    }

    /// Copies `size` bytes out. Bytes past the end read as zero.
    #[must_use]
    pub fn slice(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        self.read_into(offset, &mut out);
        out
    }

    fn read_into(&self, offset: usize, out: &mut [u8]) {
        if offset >= self.data.len() {
            return;
        }
        let end = offset.saturating_add(out.len()).min(self.data.len());
        out[..end - offset].copy_from_slice(&self.data[offset..end]);
    }

    /// Writes a word. Memory must already cover it.
    pub fn store_word(&mut self, offset: usize, word: &[u8; 32]) {
        self.data[offset..offset + WORD_SIZE].copy_from_slice(word);
    }

    /// Writes one byte. Memory must already cover it.
    pub fn store_byte(&mut self, offset: usize, byte: u8) {
        self.data[offset] = byte;
    }

    /// Copies `size` bytes of `source` starting at `source_offset` to
    /// `offset`, zero-filling past the end of `source`. Memory must already
    /// cover the destination.
    pub fn store_padded(&mut self, offset: usize, source: &[u8], source_offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        let dest = &mut self.data[offset..offset + size];
        dest.fill(0);
        if source_offset < source.len() {
            let available = (source.len() - source_offset).min(size);
            dest[..available].copy_from_slice(&source[source_offset..source_offset + available]);
        }
    }

    /// MCOPY. Overlapping ranges behave as if copied through a buffer.
    /// Memory must already cover both ranges.
    pub fn copy_within(&mut self, dest: usize, src: usize, size: usize) {
        if size > 0 {
            self.data.copy_within(src..src + size, dest);
        }
    }

    /// Memory as words, for tracing.
    #[must_use]
    pub fn words(&self) -> Vec<Hash> {
        self.data
            .chunks_exact(WORD_SIZE)
            .filter_map(Hash::from_slice)
            .collect()
    }
}

/// Total cost of `words` words of memory: `3w + w²/512`.
#[must_use]
pub fn memory_gas_cost(words: usize) -> u64 {
    let words = words as u64;
    words.saturating_mul(3).saturating_add(words.saturating_mul(words) / 512)
}

/// Cost of growing from `old_words` to `new_words`.
#[must_use]
pub fn memory_expansion_cost(old_words: usize, new_words: usize) -> u64 {
    if new_words <= old_words {
        return 0;
    }
    memory_gas_cost(new_words) - memory_gas_cost(old_words)
}

// =============================================================================
// TESTS
// =============================================================================
