//! Vertex coordinate and normal dequantization.
//!
//! Each strategy reads its parameters and one [`EncodedData`] per integer
//! stream, then turns the decoded integers into interleaved floats.
//!
//! | Kind byte | Strategy | Streams | Predictor |
//! |-----------|----------|---------|-----------|
//! | `0` | [`quantized`] | one per component | Lag1 |
//! | `1` | [`exp_mant`] | exponent + mantissa per component | None |
//! | `2` | [`deering`] | sextant, octant, theta, psi | None |
//!
//! Reading is split from finishing so the caller can hand all integer
//! streams of a payload to one [`Scheduler`] pass.
//!
//! [`EncodedData`]: crate::decode::EncodedData

pub mod deering;
pub mod exp_mant;
pub mod quantized;

use crate::decode::{CdpFormat, DecodeError, DecodeJob, Result, Scheduler};
use crate::source::ByteSource;

pub use quantized::QuantizationParams;

/// Vertex data encoding, selected by a kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexEncoding {
    Quantized,
    ExpMant,
    Deering,
}

impl VertexEncoding {
    pub fn from_u8(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Quantized),
            1 => Some(Self::ExpMant),
            2 => Some(Self::Deering),
            _ => None,
        }
    }
}

/// Interleaved float vertex data: `[x0, y0, z0, x1, ...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    components: usize,
    values: Vec<f32>,
}

impl VertexData {
    pub fn new(components: usize, values: Vec<f32>) -> Self {
        debug_assert!(components > 0 && values.len() % components == 0);
        Self { components, values }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.values.len() / self.components
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn vertex(&self, index: usize) -> &[f32] {
        &self.values[index * self.components..(index + 1) * self.components]
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

#[derive(Debug, Clone)]
enum Dequantizer {
    Quantized(Vec<QuantizationParams>),
    ExpMant,
    Deering { bits: u32 },
}

/// Vertex payload whose integer streams are loaded but not yet decoded.
#[derive(Debug)]
pub struct PendingVertexData {
    dequantizer: Dequantizer,
    components: usize,
    count: usize,
    jobs: Vec<DecodeJob>,
}

impl PendingVertexData {
    /// Read parameters and streams for `encoding`.
    ///
    /// `components` is ignored for Deering normals, which always yield three.
    pub fn read<S: ByteSource + ?Sized>(
        source: &mut S,
        format: CdpFormat,
        encoding: VertexEncoding,
        components: usize,
    ) -> Result<Self> {
        let pending = match encoding {
            VertexEncoding::Quantized => quantized::read(source, format, components)?,
            VertexEncoding::ExpMant => exp_mant::read(source, format, components)?,
            VertexEncoding::Deering => deering::read(source, format)?,
        };
        tracing::debug!(
            ?encoding,
            vertices = pending.count,
            streams = pending.jobs.len(),
            "read vertex data header"
        );
        Ok(pending)
    }

    /// Declared vertex count.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Move the integer streams out for scheduling.
    pub fn take_jobs(&mut self) -> Vec<DecodeJob> {
        std::mem::take(&mut self.jobs)
    }

    /// Dequantize the decoded streams, in the order returned by
    /// [`take_jobs`](Self::take_jobs).
    pub fn finish(self, streams: Vec<Vec<i32>>) -> Result<VertexData> {
        for stream in &streams {
            if stream.len() != self.count {
                return Err(DecodeError::ValueCountMismatch {
                    expected: self.count,
                    actual: stream.len(),
                });
            }
        }
        let values = match &self.dequantizer {
            Dequantizer::Quantized(params) => quantized::dequantize(params, &streams, self.count),
            Dequantizer::ExpMant => exp_mant::assemble(&streams, self.count),
            Dequantizer::Deering { bits } => deering::reconstruct(*bits, &streams, self.count)?,
        };
        Ok(VertexData::new(self.components, values))
    }

    /// Decode in one step.
    pub fn decode(mut self, scheduler: &Scheduler) -> Result<VertexData> {
        let jobs = self.take_jobs();
        let streams = scheduler.decode_all(jobs)?;
        self.finish(streams)
    }
}

/// Interleave per-component columns into rows.
fn interleave<F>(columns: usize, count: usize, mut value: F) -> Vec<f32>
where
    F: FnMut(usize, usize) -> f32,
{
    let mut out = Vec::with_capacity(columns * count);
    for i in 0..count {
        for c in 0..columns {
            out.push(value(c, i));
        }
    }
    out
}
