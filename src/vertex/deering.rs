//! Deering spherical normal decoding.
//!
//! The unit sphere is cut into 8 octants by the coordinate signs and each
//! octant into 6 sextants by the ordering of `|x|, |y|, |z|`. Within a
//! sextant a normal is two angles `(theta, psi)` quantized against a shared
//! table of `2^13 + 1` entries. Coarser codes are scaled up to that
//! resolution with `code << (13 - bits)`.

use std::sync::OnceLock;

use super::{Dequantizer, PendingVertexData};
use crate::decode::{CdpFormat, DecodeError, DecodeJob, EncodedData, PredictorType, Result};
use crate::source::ByteSource;

/// Table resolution in bits.
pub const MAX_BITS: u32 = 13;
const TABLE_SIZE: usize = 1 << MAX_BITS;
/// Largest psi angle of a sextant.
const PSI_MAX: f64 = 0.615_479_709;

#[derive(Debug, Clone, Copy)]
struct SinCos {
    sin: f64,
    cos: f64,
}

impl SinCos {
    fn of(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { sin, cos }
    }
}

#[derive(Debug)]
struct AngleTable {
    theta: Vec<SinCos>,
    psi: Vec<SinCos>,
}

fn table() -> &'static AngleTable {
    static TABLE: OnceLock<AngleTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let n = TABLE_SIZE as f64;
        let psi = (0..=TABLE_SIZE)
            .map(|i| SinCos::of(PSI_MAX * i as f64 / n))
            .collect();
        let theta = (0..=TABLE_SIZE)
            .map(|i| SinCos::of((PSI_MAX * i as f64 / n).tan().asin()))
            .collect();
        AngleTable { theta, psi }
    })
}

fn table_index(code: i32, bits: u32) -> Result<usize> {
    let code = u32::try_from(code).map_err(|_| DecodeError::MalformedHeader("negative normal code"))?;
    if code > 1 << bits {
        return Err(DecodeError::MalformedHeader("normal code exceeds bit depth"));
    }
    Ok((code << (MAX_BITS - bits)) as usize)
}

/// Decode one normal from its four codes.
pub fn decode_normal(bits: u32, sextant: i32, octant: i32, theta: i32, psi: i32) -> Result<[f32; 3]> {
    if bits > MAX_BITS {
        return Err(DecodeError::InvalidBitWidth(bits));
    }
    let t = table();
    let theta = t.theta[table_index(theta, bits)?];
    let psi = t.psi[table_index(psi, bits)?];

    let xx = psi.cos * theta.cos;
    let yy = psi.sin;
    let zz = psi.cos * theta.sin;
    let (mut x, mut y, mut z) = match sextant {
        0 => (xx, yy, zz),
        1 => (zz, yy, xx),
        2 => (yy, xx, zz),
        3 => (yy, zz, xx),
        4 => (zz, xx, yy),
        5 => (xx, zz, yy),
        _ => return Err(DecodeError::MalformedHeader("sextant out of range")),
    };
    if octant & 4 == 0 {
        x = -x;
    }
    if octant & 2 == 0 {
        y = -y;
    }
    if octant & 1 == 0 {
        z = -z;
    }
    Ok([x as f32, y as f32, z as f32])
}

pub(super) fn read<S: ByteSource + ?Sized>(source: &mut S, format: CdpFormat) -> Result<PendingVertexData> {
    let bits = u32::from(source.read_u8()?);
    if bits > MAX_BITS {
        return Err(DecodeError::InvalidBitWidth(bits));
    }
    let count = source.read_count("normal count")?;
    let jobs = (0..4)
        .map(|_| Ok(DecodeJob::new(EncodedData::load(source, format)?, PredictorType::None)))
        .collect::<Result<Vec<_>>>()?;

    Ok(PendingVertexData {
        dequantizer: Dequantizer::Deering { bits },
        components: 3,
        count,
        jobs,
    })
}

/// `streams` holds sextant, octant, theta and psi codes.
pub(super) fn reconstruct(bits: u32, streams: &[Vec<i32>], count: usize) -> Result<Vec<f32>> {
    let [sextants, octants, thetas, psis] = streams else {
        return Err(DecodeError::MalformedHeader("deering needs four streams"));
    };
    let mut out = Vec::with_capacity(count * 3);
    for i in 0..count {
        out.extend(decode_normal(bits, sextants[i], octants[i], thetas[i], psis[i])?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-4, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn test_positive_x() {
        for bits in [0, 6, 13] {
            assert_close(decode_normal(bits, 0, 7, 0, 0).unwrap(), [1.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_sextant_permutations_and_octant_signs() {
        assert_close(decode_normal(8, 2, 7, 0, 0).unwrap(), [0.0, 1.0, 0.0]);
        assert_close(decode_normal(8, 3, 7, 0, 0).unwrap(), [0.0, 0.0, 1.0]);
        assert_close(decode_normal(8, 0, 3, 0, 0).unwrap(), [-1.0, 0.0, 0.0]);
        assert_close(decode_normal(8, 3, 6, 0, 0).unwrap(), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_results_are_unit_length() {
        for (theta, psi) in [(0, 0), (5, 9), (31, 31), (32, 32)] {
            let n = decode_normal(5, 4, 5, theta, psi).unwrap();
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5, "length {}", len);
        }
    }

    #[test]
    fn test_corner_of_sextant() {
        // theta = psi = max: the diagonal (1, 1, 1) / sqrt(3)
        let d = 1.0 / 3f32.sqrt();
        assert_close(decode_normal(1, 0, 7, 2, 2).unwrap(), [d, d, d]);
    }

    #[test]
    fn test_invalid_codes() {
        assert!(decode_normal(8, 6, 7, 0, 0).is_err());
        assert!(decode_normal(4, 0, 7, 17, 0).is_err());
        assert!(decode_normal(4, 0, 7, -1, 0).is_err());
        assert_eq!(
            decode_normal(14, 0, 7, 0, 0),
            Err(DecodeError::InvalidBitWidth(14))
        );
    }
}
