//! Residual unpacking.
//!
//! Encoders store each value as a residual against a prediction made from
//! earlier values. The first four values are stored verbatim.
//!
//! No payload field names the predictor. It follows from the stream's role:
//!
//! | Stream | Predictor |
//! |--------|-----------|
//! | quantized coordinate and normal codes | `Lag1` |
//! | exponents, mantissas, Deering fields | `None` |
//! | topology symbols | `None` |
//!
//! [`PredictorType::from_u8`] maps the numeric type codes for callers that
//! carry them out of band.

use super::{DecodeError, Result};

/// Values before this index are stored verbatim.
const PRIMING: usize = 4;

/// Delta from `v[i-4]` to `v[i-2]` below which strip-index predicts a stride.
const STRIP_STRIDE_LIMIT: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictorType {
    #[default]
    Lag1,
    Lag2,
    Stride1,
    Stride2,
    StripIndex,
    Ramp,
    Xor1,
    Xor2,
    None,
}

impl PredictorType {
    pub fn from_u8(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Lag1,
            1 => Self::Lag2,
            2 => Self::Stride1,
            3 => Self::Stride2,
            4 => Self::StripIndex,
            5 => Self::Ramp,
            6 => Self::Xor1,
            7 => Self::Xor2,
            8 => Self::None,
            other => return Err(DecodeError::InvalidPredictor(other)),
        })
    }

    #[inline]
    fn predict(self, v: &[i32], i: usize) -> i32 {
        match self {
            Self::Lag1 | Self::Xor1 => v[i - 1],
            Self::Lag2 | Self::Xor2 => v[i - 2],
            Self::Stride1 => v[i - 1].wrapping_mul(2).wrapping_sub(v[i - 2]),
            Self::Stride2 => v[i - 2].wrapping_mul(2).wrapping_sub(v[i - 4]),
            Self::StripIndex => {
                let stride = v[i - 2].wrapping_sub(v[i - 4]);
                if stride.unsigned_abs() < STRIP_STRIDE_LIMIT as u32 {
                    v[i - 2].wrapping_add(stride)
                } else {
                    v[i - 2].wrapping_add(2)
                }
            }
            Self::Ramp => i as i32,
            Self::None => 0,
        }
    }

    /// Turn residuals into values in place.
    pub fn unpack(self, values: &mut [i32]) {
        if self == Self::None {
            return;
        }
        let xor = matches!(self, Self::Xor1 | Self::Xor2);
        for i in PRIMING..values.len() {
            let predicted = self.predict(values, i);
            values[i] = if xor {
                values[i] ^ predicted
            } else {
                values[i].wrapping_add(predicted)
            };
        }
    }
}
