//! Int32 symbol stream decoding.
//!
//! Every topology and vertex stream in a JT tessellation payload is an
//! "Int32 Compressed Data Packet" (CDP): a short header naming a codec,
//! followed by the codec's code text and optional probability contexts.
//!
//! ## Codecs
//!
//! | Id (CDP1) | Id (CDP2) | Codec | Needs context | OOB stream |
//! |-----------|-----------|-------|---------------|------------|
//! | `0` | `0` | Null | - | - |
//! | `1` | - | Bitlength (mark 1) | - | - |
//! | - | `1` | Bitlength (mark 2) | - | - |
//! | `2` | - | Huffman | Mk1 table chain | ✅ |
//! | `3` | `3` | Arithmetic | Mk1 chain / Mk2 | ✅ |
//! | - | `4` | Chopper | - | two child CDPs |
//!
//! ## Pipeline
//!
//! ```text
//! segment bytes
//!       ↓
//! ┌──────────────┐
//! │ ByteSource   │ ← primitive reads in file byte order
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │ int32_cdp    │ ← header → EncodedData (codec state, contexts, OOB)
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │ Scheduler    │ ← serial for small streams, rayon for big ones
//! └──────────────┘
//!       ↓
//! ┌──────────────┐
//! │ Predictor    │ ← residual unpacking (lag, stride, xor, ramp)
//! └──────────────┘
//!       ↓
//! Vec<i32>
//! ```

mod arithmetic;
pub mod bit_reader;
mod bitlength;
mod huffman;
pub mod int32_cdp;
pub mod predictor;
pub mod prob_context;
pub mod scheduler;

pub use bit_reader::BitReader;
pub use huffman::HuffmanTree;
pub use int32_cdp::{CdpFormat, EncodedData};
pub use predictor::PredictorType;
pub use prob_context::{ContextEntry, ProbabilityContext, ProbabilityContexts};
pub use scheduler::{DecodeJob, Scheduler, SchedulerConfig, SchedulerMode};

use std::fmt;

/// Stream decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte source or code text ran out before the read completed.
    UnexpectedEof,
    /// A bit field width outside the range the read accepts.
    InvalidBitWidth(u32),
    /// Codec id byte not known for the stream format.
    UnknownCodec(u8),
    /// A header field is out of range.
    MalformedHeader(&'static str),
    /// A declared value count disagrees with what was decoded.
    ValueCountMismatch { expected: usize, actual: usize },
    /// The codec did not consume exactly the declared code text.
    CodeTextLength { declared: u64, consumed: u64 },
    /// A probability context table is malformed.
    InvalidContext(&'static str),
    /// An escape symbol was decoded but the OOB stream is exhausted.
    OobExhausted,
    /// Unknown predictor type code.
    InvalidPredictor(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "Unexpected end of data"),
            Self::InvalidBitWidth(n) => write!(f, "Invalid bit field width: {}", n),
            Self::UnknownCodec(id) => write!(f, "Unknown codec id: {}", id),
            Self::MalformedHeader(what) => write!(f, "Malformed stream header: {}", what),
            Self::ValueCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Value count mismatch: expected {}, decoded {}",
                    expected, actual
                )
            }
            Self::CodeTextLength { declared, consumed } => {
                write!(
                    f,
                    "Code text length mismatch: declared {} bits, consumed {}",
                    declared, consumed
                )
            }
            Self::InvalidContext(what) => write!(f, "Invalid probability context: {}", what),
            Self::OobExhausted => write!(f, "Out-of-band value stream exhausted"),
            Self::InvalidPredictor(p) => write!(f, "Invalid predictor type: {}", p),
        }
    }
}

impl std::error::Error for DecodeError {}

pub type Result<T> = std::result::Result<T, DecodeError>;
