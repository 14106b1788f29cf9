//! Uniform quantization.

use super::{interleave, Dequantizer, PendingVertexData};
use crate::decode::{CdpFormat, DecodeJob, EncodedData, PredictorType, Result};
use crate::source::ByteSource;

/// Range and code width of one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationParams {
    pub min: f32,
    pub max: f32,
    pub bits: u8,
}

impl QuantizationParams {
    fn max_code(&self) -> f64 {
        if self.bits >= 32 {
            f64::from(u32::MAX)
        } else {
            f64::from((1u32 << self.bits) - 1)
        }
    }

    /// `min + (code - 0.5) * (max - min) / maxCode`
    #[inline]
    pub fn dequantize(&self, code: i32) -> f32 {
        if self.bits == 0 {
            return self.min;
        }
        let code = f64::from(code as u32);
        let step = (f64::from(self.max) - f64::from(self.min)) / self.max_code();
        (f64::from(self.min) + (code - 0.5) * step) as f32
    }
}

pub(super) fn read<S: ByteSource + ?Sized>(
    source: &mut S,
    format: CdpFormat,
    components: usize,
) -> Result<PendingVertexData> {
    let params = (0..components)
        .map(|_| {
            Ok(QuantizationParams {
                min: source.read_f32()?,
                max: source.read_f32()?,
                bits: source.read_u8()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let count = source.read_count("vertex count")?;
    let jobs = (0..components)
        .map(|_| Ok(DecodeJob::new(EncodedData::load(source, format)?, PredictorType::Lag1)))
        .collect::<Result<Vec<_>>>()?;

    Ok(PendingVertexData {
        dequantizer: Dequantizer::Quantized(params),
        components,
        count,
        jobs,
    })
}

pub(super) fn dequantize(params: &[QuantizationParams], codes: &[Vec<i32>], count: usize) -> Vec<f32> {
    interleave(params.len(), count, |c, i| params[c].dequantize(codes[c][i]))
}
