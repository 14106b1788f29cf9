//! Int32 compressed data packet loading and decoding.
//!
//! [`EncodedData::load`] parses a packet header from a [`ByteSource`] into
//! codec state; [`EncodedData::decode`] consumes that state and yields the
//! symbol values. Loading is strictly sequential on the source, decoding
//! touches only the owned state and can run on any thread.

use super::arithmetic::ArithmeticCodec;
use super::bitlength::{Bitlength2Codec, BitlengthCodec};
use super::huffman::HuffmanCodec;
use super::{BitReader, DecodeError, ProbabilityContexts, Result};
use crate::source::ByteSource;

/// Nesting limit for OOB and chopper child streams.
const MAX_NESTING: u32 = 8;

/// Packet layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdpFormat {
    /// Legacy layout with Mk1 contexts.
    Cdp1,
    #[default]
    Cdp2,
}

/// Chopper composition of two child streams.
#[derive(Debug)]
pub enum Chopper {
    /// `chop == 0`: the child stream is the result.
    Passthrough(Box<EncodedData>),
    Split {
        value_count: usize,
        bias: i32,
        /// `span - chop`
        shift: u32,
        msb: Box<EncodedData>,
        lsb: Box<EncodedData>,
    },
}

/// Loaded codec state for one stream.
#[derive(Debug)]
pub enum EncodedData {
    Null(Vec<i32>),
    Bitlength(BitlengthCodec),
    Bitlength2(Bitlength2Codec),
    Huffman {
        codec: HuffmanCodec,
        oob: Option<Box<EncodedData>>,
    },
    Arithmetic {
        codec: ArithmeticCodec,
        oob: Option<Box<EncodedData>>,
    },
    Chopper(Chopper),
}

/// CDP1 codec ids.
const CDP1_NULL: u8 = 0;
const CDP1_BITLENGTH: u8 = 1;
const CDP1_HUFFMAN: u8 = 2;
const CDP1_ARITHMETIC: u8 = 3;

/// CDP2 codec ids.
const CDP2_NULL: u8 = 0;
const CDP2_BITLENGTH: u8 = 1;
const CDP2_ARITHMETIC: u8 = 3;
const CDP2_CHOPPER: u8 = 4;

fn words_as_i32(words: Vec<u32>) -> Vec<i32> {
    words.into_iter().map(|w| w as i32).collect()
}

/// Read a code text vector whose word count must cover `bits` exactly.
fn read_code_text<S: ByteSource + ?Sized>(source: &mut S, bits: u64) -> Result<BitReader> {
    let words = source.read_vec_u32()?;
    if words.len() as u64 != bits.div_ceil(32) {
        return Err(DecodeError::MalformedHeader("code text length disagrees with bit count"));
    }
    Ok(BitReader::from_words(words))
}

fn expect_count(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(DecodeError::ValueCountMismatch { expected, actual });
    }
    Ok(())
}

impl EncodedData {
    /// Load one packet in the given layout.
    pub fn load<S: ByteSource + ?Sized>(source: &mut S, format: CdpFormat) -> Result<Self> {
        match format {
            CdpFormat::Cdp1 => Self::load_cdp1(source),
            CdpFormat::Cdp2 => Self::load_cdp2(source),
        }
    }

    pub fn load_cdp2<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        Self::load_cdp2_nested(source, 0)
    }

    pub fn load_cdp1<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        Self::load_cdp1_nested(source, 0)
    }

    fn load_cdp2_nested<S: ByteSource + ?Sized>(source: &mut S, depth: u32) -> Result<Self> {
        if depth > MAX_NESTING {
            return Err(DecodeError::MalformedHeader("stream nesting too deep"));
        }
        let value_count = source.read_count("value count")?;
        if value_count == 0 {
            return Ok(Self::Null(Vec::new()));
        }

        let codec_id = source.read_u8()?;
        let data = match codec_id {
            CDP2_NULL => {
                let values = words_as_i32(source.read_vec_u32()?);
                expect_count(value_count, values.len())?;
                Self::Null(values)
            }
            CDP2_BITLENGTH => {
                let code_text_bits = source.read_count("code text length")? as u64;
                let code = read_code_text(source, code_text_bits)?;
                Self::Bitlength2(Bitlength2Codec {
                    value_count,
                    code_text_bits,
                    code,
                })
            }
            CDP2_ARITHMETIC => {
                let code_text_bits = source.read_count("code text length")? as u64;
                let code = read_code_text(source, code_text_bits)?;
                let contexts = ProbabilityContexts::read_mk2(source)?;
                let oob = Self::load_cdp2_nested(source, depth + 1)?;
                Self::Arithmetic {
                    codec: ArithmeticCodec {
                        value_count,
                        code,
                        contexts,
                    },
                    oob: Some(Box::new(oob)),
                }
            }
            CDP2_CHOPPER => Self::Chopper(Self::load_chopper(source, value_count, depth)?),
            other => return Err(DecodeError::UnknownCodec(other)),
        };

        tracing::debug!(codec = data.codec_name(), values = value_count, "loaded cdp2 stream");
        Ok(data)
    }

    fn load_chopper<S: ByteSource + ?Sized>(
        source: &mut S,
        value_count: usize,
        depth: u32,
    ) -> Result<Chopper> {
        let chop = u32::from(source.read_u8()?);
        if chop == 0 {
            let inner = Self::load_cdp2_nested(source, depth + 1)?;
            expect_count(value_count, inner.value_count())?;
            return Ok(Chopper::Passthrough(Box::new(inner)));
        }

        let bias = source.read_i32()?;
        let span = u32::from(source.read_u8()?);
        if span > 32 || chop > span {
            return Err(DecodeError::MalformedHeader("chopper span"));
        }
        let msb = Self::load_cdp2_nested(source, depth + 1)?;
        let lsb = Self::load_cdp2_nested(source, depth + 1)?;
        expect_count(value_count, msb.value_count())?;
        expect_count(value_count, lsb.value_count())?;
        Ok(Chopper::Split {
            value_count,
            bias,
            shift: span - chop,
            msb: Box::new(msb),
            lsb: Box::new(lsb),
        })
    }

    fn load_cdp1_nested<S: ByteSource + ?Sized>(source: &mut S, depth: u32) -> Result<Self> {
        if depth > MAX_NESTING {
            return Err(DecodeError::MalformedHeader("stream nesting too deep"));
        }
        let codec_id = source.read_u8()?;
        if codec_id > CDP1_ARITHMETIC {
            return Err(DecodeError::UnknownCodec(codec_id));
        }

        let mut contexts = None;
        let mut oob = None;
        if matches!(codec_id, CDP1_HUFFMAN | CDP1_ARITHMETIC) {
            contexts = Some(ProbabilityContexts::read_mk1(source)?);
            let oob_count = source.read_count("oob value count")?;
            if oob_count > 0 {
                let stream = Self::load_cdp1_nested(source, depth + 1)?;
                expect_count(oob_count, stream.value_count())?;
                oob = Some(Box::new(stream));
            }
        }

        let code_text_bits = source.read_count("code text length")? as u64;
        let value_count = source.read_count("value count")?;
        if contexts.as_ref().is_some_and(|c| c.len() > 1) {
            // Symbol count; the value count already bounds decoding.
            let _ = source.read_i32()?;
        }

        let data = match (codec_id, contexts) {
            (CDP1_NULL, _) => {
                let values = words_as_i32(source.read_vec_u32()?);
                expect_count(value_count, values.len())?;
                Self::Null(values)
            }
            (CDP1_BITLENGTH, _) => Self::Bitlength(BitlengthCodec {
                value_count,
                code_text_bits,
                code: read_code_text(source, code_text_bits)?,
            }),
            (CDP1_HUFFMAN, Some(contexts)) => Self::Huffman {
                codec: HuffmanCodec {
                    value_count,
                    code_text_bits,
                    code: read_code_text(source, code_text_bits)?,
                    contexts,
                },
                oob,
            },
            (CDP1_ARITHMETIC, Some(contexts)) => Self::Arithmetic {
                codec: ArithmeticCodec {
                    value_count,
                    code: read_code_text(source, code_text_bits)?,
                    contexts,
                },
                oob,
            },
            (other, _) => return Err(DecodeError::UnknownCodec(other)),
        };

        tracing::debug!(codec = data.codec_name(), values = value_count, "loaded cdp1 stream");
        Ok(data)
    }

    /// Number of values `decode` yields.
    pub fn value_count(&self) -> usize {
        match self {
            Self::Null(values) => values.len(),
            Self::Bitlength(c) => c.value_count,
            Self::Bitlength2(c) => c.value_count,
            Self::Huffman { codec, .. } => codec.value_count,
            Self::Arithmetic { codec, .. } => codec.value_count,
            Self::Chopper(Chopper::Passthrough(inner)) => inner.value_count(),
            Self::Chopper(Chopper::Split { value_count, .. }) => *value_count,
        }
    }

    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Bitlength(_) => "bitlength",
            Self::Bitlength2(_) => "bitlength2",
            Self::Huffman { .. } => "huffman",
            Self::Arithmetic { .. } => "arithmetic",
            Self::Chopper(_) => "chopper",
        }
    }

    /// Decode the stream, consuming the codec state.
    pub fn decode(self) -> Result<Vec<i32>> {
        let values = match self {
            Self::Null(values) => values,
            Self::Bitlength(codec) => codec.decode()?,
            Self::Bitlength2(codec) => codec.decode()?,
            Self::Huffman { codec, oob } => codec.decode(&decode_oob(oob)?)?,
            Self::Arithmetic { codec, oob } => codec.decode(&decode_oob(oob)?)?,
            Self::Chopper(Chopper::Passthrough(inner)) => inner.decode()?,
            Self::Chopper(Chopper::Split {
                value_count,
                bias,
                shift,
                msb,
                lsb,
            }) => {
                let msb = msb.decode()?;
                let lsb = lsb.decode()?;
                expect_count(value_count, msb.len())?;
                expect_count(value_count, lsb.len())?;
                msb.iter()
                    .zip(&lsb)
                    .map(|(&hi, &lo)| {
                        (i64::from(hi) << shift)
                            .wrapping_add(i64::from(lo))
                            .wrapping_add(i64::from(bias)) as i32
                    })
                    .collect()
            }
        };
        Ok(values)
    }
}

fn decode_oob(oob: Option<Box<EncodedData>>) -> Result<Vec<i32>> {
    oob.map_or_else(|| Ok(Vec::new()), |stream| stream.decode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ByteOrder, SliceSource};
    use crate::test_util::{BitWriter, ByteWriter};

    fn load2(bytes: &[u8]) -> Result<EncodedData> {
        EncodedData::load_cdp2(&mut SliceSource::new(bytes, ByteOrder::Little))
    }

    #[test]
    fn test_cdp2_null_round() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.cdp2_null(&[1, -2, 3]);
        let bytes = w.into_bytes();
        let data = load2(&bytes).unwrap();

        assert_eq!(data.codec_name(), "null");
        assert_eq!(data.value_count(), 3);
        assert_eq!(data.decode().unwrap(), vec![1, -2, 3]);
    }

    #[test]
    fn test_cdp2_empty_stream() {
        let bytes = 0i32.to_le_bytes();
        let mut src = SliceSource::new(&bytes, ByteOrder::Little);
        let data = EncodedData::load_cdp2(&mut src).unwrap();

        assert!(src.is_exhausted());
        assert_eq!(data.decode().unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_cdp2_null_count_mismatch() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(3).u8(0).vec_u32(&[1, 2]);
        let bytes = w.into_bytes();

        assert_eq!(
            load2(&bytes).unwrap_err(),
            DecodeError::ValueCountMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_cdp2_unknown_codec() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(1).u8(2);
        let bytes = w.into_bytes();

        assert_eq!(load2(&bytes).unwrap_err(), DecodeError::UnknownCodec(2));
    }

    #[test]
    fn test_cdp2_bitlength_big_endian() {
        let mut bits = BitWriter::new();
        bits.write(0, 1);
        bits.write(3, 6);
        bits.write(3, 6);
        bits.write_i32(2, 3);
        bits.write_i32(2, 3);
        let mut w = ByteWriter::new(ByteOrder::Big);
        w.cdp2_bitlength(4, bits);
        let bytes = w.into_bytes();

        let data = EncodedData::load_cdp2(&mut SliceSource::new(&bytes, ByteOrder::Big)).unwrap();
        assert_eq!(data.decode().unwrap(), vec![2; 4]);
    }

    #[test]
    fn test_cdp2_code_text_word_count_checked() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(4).u8(1).i32(40).vec_u32(&[0]);
        let bytes = w.into_bytes();

        assert!(matches!(load2(&bytes), Err(DecodeError::MalformedHeader(_))));
    }

    #[test]
    fn test_cdp2_chopper_split() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(3).u8(4).u8(4).i32(-100).u8(12);
        w.cdp2_null(&[1, 0, 15]);
        w.cdp2_null(&[5, 255, 0]);
        let bytes = w.into_bytes();
        let data = load2(&bytes).unwrap();

        assert_eq!(data.codec_name(), "chopper");
        // (msb << 8) + lsb - 100
        assert_eq!(data.decode().unwrap(), vec![161, 155, 3740]);
    }

    #[test]
    fn test_cdp2_chopper_passthrough() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(2).u8(4).u8(0);
        w.cdp2_null(&[7, 8]);
        let bytes = w.into_bytes();

        assert_eq!(load2(&bytes).unwrap().decode().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_cdp2_chopper_child_count_mismatch() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(2).u8(4).u8(0);
        w.cdp2_null(&[7]);
        let bytes = w.into_bytes();

        assert!(matches!(
            load2(&bytes),
            Err(DecodeError::ValueCountMismatch { .. })
        ));
    }

    #[test]
    fn test_cdp2_arithmetic_single_symbol() {
        let mut ctx = BitWriter::new();
        ctx.write(1, 16);
        ctx.write(2, 6);
        ctx.write(4, 6);
        ctx.write(4, 6);
        ctx.write(0, 32);
        ctx.write(2, 2);
        ctx.write(9, 4);
        ctx.write(7, 4);
        let mut w = ByteWriter::new(ByteOrder::Little);
        w.i32(5).u8(3).i32(0).vec_u32(&[]);
        w.words(&ctx.finish());
        w.cdp2_null(&[]);
        let bytes = w.into_bytes();
        let mut src = SliceSource::new(&bytes, ByteOrder::Little);
        let data = EncodedData::load_cdp2(&mut src).unwrap();

        assert!(src.is_exhausted());
        assert_eq!(data.decode().unwrap(), vec![7; 5]);
    }

    #[test]
    fn test_cdp2_nesting_limit() {
        let mut w = ByteWriter::new(ByteOrder::Little);
        for _ in 0..=MAX_NESTING + 1 {
            w.i32(1).u8(4).u8(0);
        }
        let bytes = w.into_bytes();

        assert!(matches!(load2(&bytes), Err(DecodeError::MalformedHeader(_))));
    }

    #[test]
    fn test_cdp1_null() {
        let mut w = ByteWriter::new(ByteOrder::Big);
        w.cdp1_null(&[4, 5]);
        let bytes = w.into_bytes();
        let data = EncodedData::load(&mut SliceSource::new(&bytes, ByteOrder::Big), CdpFormat::Cdp1)
            .unwrap();

        assert_eq!(data.decode().unwrap(), vec![4, 5]);
    }

    /// Two-entry Huffman stream over `value 5` and an escape, with code
    /// text `101` and the given declared length.
    fn cdp1_huffman_bytes(code_text_bits: i32) -> Vec<u8> {
        let mut table = BitWriter::new();
        table.write(2, 32);
        table.write(2, 6);
        table.write(1, 6);
        table.write(3, 6);
        table.write(0, 6);
        table.write(0, 32);
        // value 5, then the escape
        table.write(2, 2);
        table.write(1, 1);
        table.write(5, 3);
        table.write(0, 2);
        table.write(1, 1);
        table.write(0, 3);

        let mut code = BitWriter::new();
        code.write(0b101, 3);

        let mut w = ByteWriter::new(ByteOrder::Little);
        w.u8(2).u8(1).words(&table.finish());
        w.i32(1).cdp1_null(&[-9]);
        w.i32(code_text_bits).i32(3).vec_u32(&code.finish());
        w.into_bytes()
    }

    #[test]
    fn test_cdp1_huffman_with_oob() {
        let bytes = cdp1_huffman_bytes(3);
        let mut src = SliceSource::new(&bytes, ByteOrder::Little);
        let data = EncodedData::load_cdp1(&mut src).unwrap();
        assert!(src.is_exhausted());
        assert_eq!(data.codec_name(), "huffman");
        assert_eq!(data.value_count(), 3);
        assert_eq!(data.decode().unwrap(), vec![5, -9, 5]);
    }

    #[test]
    fn test_cdp1_huffman_code_text_over_declared() {
        let bytes = cdp1_huffman_bytes(4);
        let mut src = SliceSource::new(&bytes, ByteOrder::Little);
        let data = EncodedData::load_cdp1(&mut src).unwrap();

        assert_eq!(
            data.decode().unwrap_err(),
            DecodeError::CodeTextLength {
                declared: 4,
                consumed: 3
            }
        );
    }

    #[test]
    fn test_cdp1_bitlength() {
        let mut code = BitWriter::new();
        // grow twice to width 4, then two values at that width
        code.write(0b1110, 4);
        code.write(3, 4);
        code.write(0, 1);
        code.write_i32(-2, 4);
        code.write(0, 1);
        code.write(1, 4);
        let bits = code.len() as i32;

        let mut w = ByteWriter::new(ByteOrder::Big);
        w.u8(1).i32(bits).i32(3).vec_u32(&code.finish());
        let bytes = w.into_bytes();
        let mut src = SliceSource::new(&bytes, ByteOrder::Big);
        let data = EncodedData::load_cdp1(&mut src).unwrap();

        assert!(src.is_exhausted());
        assert_eq!(data.codec_name(), "bitlength");
        assert_eq!(data.decode().unwrap(), vec![3, -2, 1]);
    }

    #[test]
    fn test_cdp1_arithmetic_chain_with_oob() {
        // context 0 holds only an escape and hands over to context 1, which
        // holds only the value 7 and hands back
        let mut tables = BitWriter::new();
        for (symbol, value, next) in [(0u32, 0u32, 1u32), (2, 7, 0)] {
            tables.write(1, 32);
            tables.write(2, 6);
            tables.write(1, 6);
            tables.write(4, 6);
            tables.write(1, 6);
            tables.write(0, 32);
            tables.write(symbol, 2);
            tables.write(1, 1);
            tables.write(value, 4);
            tables.write(next, 1);
        }

        let mut w = ByteWriter::new(ByteOrder::Little);
        w.u8(3).u8(2).words(&tables.finish());
        w.i32(2).cdp1_null(&[-4, 11]);
        // code text bits, value count, symbol count
        w.i32(0).i32(4).i32(4).vec_u32(&[]);
        let bytes = w.into_bytes();
        let mut src = SliceSource::new(&bytes, ByteOrder::Little);
        let data = EncodedData::load_cdp1(&mut src).unwrap();

        assert!(src.is_exhausted());
        assert_eq!(data.codec_name(), "arithmetic");
        assert_eq!(data.decode().unwrap(), vec![-4, 7, 11, 7]);
    }

    #[test]
    fn test_cdp1_unknown_codec() {
        let bytes = [9u8];
        assert_eq!(
            EncodedData::load_cdp1(&mut SliceSource::new(&bytes, ByteOrder::Little)).unwrap_err(),
            DecodeError::UnknownCodec(9)
        );
    }
}
