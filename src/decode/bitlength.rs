//! Bitlength codecs.
//!
//! Mark 1 adjusts a running field width in steps of two before every value.
//! Mark 2 either packs every value at one fixed width relative to a minimum,
//! or codes runs of values around a mean with a per-run width.

use super::{BitReader, DecodeError, Result};

/// Width step of the mark 1 codec.
const WIDTH_STEP: i32 = 2;
const MAX_WIDTH: i32 = 32;

fn check_consumed(code: &BitReader, declared: u64) -> Result<()> {
    if code.bits_consumed() != declared {
        return Err(DecodeError::CodeTextLength {
            declared,
            consumed: code.bits_consumed(),
        });
    }
    Ok(())
}

/// Mark 1 codec state (CDP1).
#[derive(Debug)]
pub struct BitlengthCodec {
    pub(crate) value_count: usize,
    pub(crate) code_text_bits: u64,
    pub(crate) code: BitReader,
}

impl BitlengthCodec {
    pub fn decode(mut self) -> Result<Vec<i32>> {
        let code = &mut self.code;
        let mut width = 0i32;
        let mut out = Vec::with_capacity(self.value_count);
        for _ in 0..self.value_count {
            if code.read_bit()? == 1 {
                let grow = code.read_bit()?;
                let step = if grow == 1 { WIDTH_STEP } else { -WIDTH_STEP };
                loop {
                    width += step;
                    if !(0..=MAX_WIDTH).contains(&width) {
                        return Err(DecodeError::InvalidBitWidth(width as u32));
                    }
                    if code.read_bit()? != grow {
                        break;
                    }
                }
            }
            out.push(code.read_i32_or_0(width as u32)?);
        }
        check_consumed(code, self.code_text_bits)?;
        Ok(out)
    }
}

/// Mark 2 codec state (CDP2).
#[derive(Debug)]
pub struct Bitlength2Codec {
    pub(crate) value_count: usize,
    pub(crate) code_text_bits: u64,
    pub(crate) code: BitReader,
}

impl Bitlength2Codec {
    pub fn decode(mut self) -> Result<Vec<i32>> {
        let out = if self.value_count == 0 {
            Vec::new()
        } else if self.code.read_bit()? == 0 {
            decode_fixed(&mut self.code, self.value_count)?
        } else {
            decode_variable(&mut self.code, self.value_count)?
        };
        check_consumed(&self.code, self.code_text_bits)?;
        Ok(out)
    }
}

/// Fixed width relative to the minimum.
fn decode_fixed(code: &mut BitReader, count: usize) -> Result<Vec<i32>> {
    let min_bits = code.read_u32(6)?;
    let max_bits = code.read_u32(6)?;
    if min_bits > 32 || max_bits > 32 {
        return Err(DecodeError::InvalidBitWidth(min_bits.max(max_bits)));
    }
    let min = code.read_i32_or_0(min_bits)?;
    let max = code.read_i32_or_0(max_bits)?;
    if max <= min {
        return Ok(vec![min; count]);
    }

    // Bits needed to hold max - min.
    let range = (i64::from(max) - i64::from(min)) as u64;
    let width = 64 - range.leading_zeros();
    tracing::trace!(min, max, width, "bitlength2 fixed width");
    (0..count)
        .map(|_| Ok(min.wrapping_add(code.read_u32_or_0(width)? as i32)))
        .collect()
}

/// Width delta, repeated while it sits at an extreme of its field.
fn read_width_delta(code: &mut BitReader, bits: u32) -> Result<i32> {
    if bits == 0 {
        return Ok(0);
    }
    let field_max = (1i32 << (bits - 1)) - 1;
    let field_min = -(1i32 << (bits - 1));
    let mut total = 0i32;
    loop {
        let delta = code.read_i32(bits)?;
        total = total.saturating_add(delta);
        if delta != field_max && delta != field_min {
            return Ok(total);
        }
    }
}

/// Runs of values around a mean.
fn decode_variable(code: &mut BitReader, count: usize) -> Result<Vec<i32>> {
    let mean = code.read_i32(32)?;
    let change_width_bits = code.read_u32(3)?;
    let run_len_bits = code.read_u32(3)?;

    let mut width = 0i32;
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        width = width.saturating_add(read_width_delta(code, change_width_bits)?);
        if width > MAX_WIDTH {
            return Err(DecodeError::InvalidBitWidth(width as u32));
        }
        let remaining = count - out.len();
        let run = if run_len_bits == 0 {
            remaining
        } else {
            code.read_u32(run_len_bits)? as usize
        };
        if run > remaining {
            return Err(DecodeError::MalformedHeader("bitlength2 run past value count"));
        }
        for _ in 0..run {
            let value = if width <= 0 {
                mean
            } else {
                mean.wrapping_add(code.read_i32(width as u32)?)
            };
            out.push(value);
        }
    }
    Ok(out)
}
