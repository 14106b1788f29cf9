//! 16-bit arithmetic decoder.
//!
//! The coder keeps `low`, `high` and `code` registers of 16 bits. Each symbol
//! narrows the interval by its cumulative count within the active context,
//! then the registers are renormalised one bit at a time. Bits past the end of
//! the code text read as zero, so this codec does not check consumption.

use super::prob_context::{ContextEntry, ProbabilityContexts, MAX_TOTAL_COUNT};
use super::{BitReader, DecodeError, Result};

const MSB: u32 = 0x8000;
const SECOND_MSB: u32 = 0x4000;
const MASK: u32 = 0xFFFF;

/// Arithmetic codec state.
#[derive(Debug)]
pub struct ArithmeticCodec {
    pub(crate) value_count: usize,
    pub(crate) code: BitReader,
    pub(crate) contexts: ProbabilityContexts,
}

/// Coder registers.
#[derive(Debug)]
struct Registers {
    low: u32,
    high: u32,
    code: u32,
}

impl Registers {
    fn start(reader: &mut BitReader) -> Self {
        let code = (0..16).fold(0, |acc, _| (acc << 1) | reader.read_bit_or_0());
        Self {
            low: 0,
            high: MASK,
            code,
        }
    }

    /// Cumulative count targeted by the current code value.
    #[inline]
    fn target(&self, total: u32) -> Result<u32> {
        if self.code < self.low || self.code > self.high {
            return Err(DecodeError::InvalidContext("arithmetic code outside interval"));
        }
        let range = self.high - self.low + 1;
        let cum = ((self.code - self.low + 1) * total - 1) / range;
        Ok(cum)
    }

    #[inline]
    fn narrow(&mut self, lo_count: u32, hi_count: u32, total: u32) {
        let range = self.high - self.low + 1;
        self.high = self.low + range * hi_count / total - 1;
        self.low += range * lo_count / total;
    }

    fn renormalise(&mut self, reader: &mut BitReader) {
        loop {
            if (self.high ^ self.low) & MSB == 0 {
                // top bits agree: shift out
            } else if self.low & SECOND_MSB != 0 && self.high & SECOND_MSB == 0 {
                // underflow
                self.code ^= SECOND_MSB;
                self.low &= SECOND_MSB - 1;
                self.high |= SECOND_MSB;
            } else {
                return;
            }
            self.low = (self.low << 1) & MASK;
            self.high = ((self.high << 1) | 1) & MASK;
            self.code = ((self.code << 1) | reader.read_bit_or_0()) & MASK;
        }
    }
}

/// Locate the entry whose cumulative interval contains `target`.
///
/// Returns the entry with its low and high cumulative counts.
fn find_entry(entries: &[ContextEntry], target: u32) -> Option<(ContextEntry, u32, u32)> {
    let mut lo = 0u32;
    for entry in entries {
        let hi = lo + entry.occ_count;
        if target < hi {
            return Some((*entry, lo, hi));
        }
        lo = hi;
    }
    None
}

impl ArithmeticCodec {
    /// Decode all values; escapes pull from `oob` in order.
    pub fn decode(mut self, oob: &[i32]) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(self.value_count);
        if self.value_count == 0 {
            return Ok(out);
        }

        let mut oob_values = oob.iter();
        let mut regs = Registers::start(&mut self.code);
        let mut current = 0u32;
        for _ in 0..self.value_count {
            let table = self
                .contexts
                .get(current)
                .ok_or(DecodeError::InvalidContext("next context out of range"))?;
            let total = table.total_count();
            if total == 0 || total > MAX_TOTAL_COUNT {
                return Err(DecodeError::InvalidContext("total count out of range"));
            }

            let target = regs.target(total)?;
            let (entry, lo, hi) = find_entry(table.entries(), target)
                .ok_or(DecodeError::InvalidContext("cumulative count not found"))?;
            regs.narrow(lo, hi, total);
            regs.renormalise(&mut self.code);

            let value = if entry.is_escape() {
                *oob_values.next().ok_or(DecodeError::OobExhausted)?
            } else {
                entry.value
            };
            out.push(value);
            current = entry.next_context;
        }
        Ok(out)
    }
}
