//! Lossless exponent/mantissa floats.
//!
//! The exponent stream carries the sign bit above the 8 exponent bits, so a
//! value is rebuilt as `(exp << 23) | mantissa`.

use super::{interleave, Dequantizer, PendingVertexData};
use crate::decode::{CdpFormat, DecodeJob, EncodedData, PredictorType, Result};
use crate::source::ByteSource;

const MANTISSA_MASK: u32 = 0x007F_FFFF;

#[inline]
pub fn assemble_f32(exponent: i32, mantissa: i32) -> f32 {
    f32::from_bits(((exponent as u32) << 23) | (mantissa as u32 & MANTISSA_MASK))
}

pub(super) fn read<S: ByteSource + ?Sized>(
    source: &mut S,
    format: CdpFormat,
    components: usize,
) -> Result<PendingVertexData> {
    let count = source.read_count("vertex count")?;
    let mut jobs = Vec::with_capacity(components * 2);
    for _ in 0..components {
        jobs.push(DecodeJob::new(EncodedData::load(source, format)?, PredictorType::None));
        jobs.push(DecodeJob::new(EncodedData::load(source, format)?, PredictorType::None));
    }
    Ok(PendingVertexData {
        dequantizer: Dequantizer::ExpMant,
        components,
        count,
        jobs,
    })
}

/// `streams` alternates exponent and mantissa per component.
pub(super) fn assemble(streams: &[Vec<i32>], count: usize) -> Vec<f32> {
    let components = streams.len() / 2;
    interleave(components, count, |c, i| {
        assemble_f32(streams[2 * c][i], streams[2 * c + 1][i])
    })
}
