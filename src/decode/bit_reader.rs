//! Bit reader for CDP code text.
//!
//! Code text is stored as 32-bit words in file byte order; bits are consumed
//! MSB first from each word. Words are converted to host order when loaded,
//! so the reader itself never swaps.

use super::{DecodeError, Result};
use crate::source::ByteSource;

/// Bit reader over a pre-loaded word buffer.
#[derive(Debug, Clone, Default)]
pub struct BitReader {
    words: Vec<u32>,
    /// Next word to move into the buffer
    next_word: usize,
    /// Unread bits, left-aligned
    buffer: u32,
    /// Valid bits in buffer
    bits_in_buffer: u32,
    /// Total bits consumed
    consumed: u64,
}

impl BitReader {
    /// Create a reader over already-loaded words ("U32" mode).
    pub fn from_words(words: Vec<u32>) -> Self {
        Self {
            words,
            ..Self::default()
        }
    }

    /// Load a count-prefixed word vector from the source.
    pub fn load_vec_u32<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        Ok(Self::from_words(source.read_vec_u32()?))
    }

    /// "Raw" mode: pull whole words from `source` until at least `nbits`
    /// unread bits are available.
    pub fn load_raw<S: ByteSource + ?Sized>(&mut self, source: &mut S, nbits: u64) -> Result<()> {
        let available = self.bits_remaining();
        if available >= nbits {
            return Ok(());
        }
        let missing = nbits - available;
        let words = missing.div_ceil(32) as usize;
        let loaded = source.read_u32_words(words)?;
        self.words.extend(loaded);
        Ok(())
    }

    /// Drop the unread tail of the current word, returning to a word boundary.
    pub fn discard_partial_word(&mut self) {
        self.consumed += u64::from(self.bits_in_buffer);
        self.buffer = 0;
        self.bits_in_buffer = 0;
    }

    #[inline]
    fn refill(&mut self) -> Result<()> {
        let word = *self
            .words
            .get(self.next_word)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.next_word += 1;
        self.buffer = word;
        self.bits_in_buffer = 32;
        Ok(())
    }

    /// Take `n` (1..=32) bits that are known to be in the buffer.
    #[inline]
    fn take(&mut self, n: u32) -> u32 {
        debug_assert!(n >= 1 && n <= self.bits_in_buffer);
        let value = self.buffer >> (32 - n);
        self.buffer = if n == 32 { 0 } else { self.buffer << n };
        self.bits_in_buffer -= n;
        value
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<u32> {
        if self.bits_in_buffer == 0 {
            self.refill()?;
        }
        self.consumed += 1;
        Ok(self.take(1))
    }

    /// Read a single bit, yielding 0 once the code text is exhausted.
    #[inline]
    pub fn read_bit_or_0(&mut self) -> u32 {
        self.read_bit().unwrap_or(0)
    }

    /// Read an `n`-bit unsigned field, `1 <= n <= 32`.
    pub fn read_u32(&mut self, n: u32) -> Result<u32> {
        if n == 0 || n > 32 {
            return Err(DecodeError::InvalidBitWidth(n));
        }
        if u64::from(n) > self.bits_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }

        let value = if n <= self.bits_in_buffer {
            self.take(n)
        } else {
            // Split across a word boundary.
            let high_bits = self.bits_in_buffer;
            let high = if high_bits == 0 { 0 } else { self.take(high_bits) };
            self.refill()?;
            let low_bits = n - high_bits;
            let low = self.take(low_bits);
            if high_bits == 0 {
                low
            } else {
                (high << low_bits) | low
            }
        };
        self.consumed += u64::from(n);
        Ok(value)
    }

    /// Read an `n`-bit two's complement field, sign-extended.
    pub fn read_i32(&mut self, n: u32) -> Result<i32> {
        let raw = self.read_u32(n)?;
        let shift = 32 - n;
        Ok(((raw << shift) as i32) >> shift)
    }

    /// Like [`read_u32`](Self::read_u32) but a zero width yields 0.
    #[inline]
    pub fn read_u32_or_0(&mut self, n: u32) -> Result<u32> {
        if n == 0 {
            Ok(0)
        } else {
            self.read_u32(n)
        }
    }

    /// Like [`read_i32`](Self::read_i32) but a zero width yields 0.
    #[inline]
    pub fn read_i32_or_0(&mut self, n: u32) -> Result<i32> {
        if n == 0 {
            Ok(0)
        } else {
            self.read_i32(n)
        }
    }

    /// Total bits consumed.
    pub fn bits_consumed(&self) -> u64 {
        self.consumed
    }

    /// Unread bits still available.
    pub fn bits_remaining(&self) -> u64 {
        u64::from(self.bits_in_buffer) + (self.words.len() - self.next_word) as u64 * 32
    }
}
