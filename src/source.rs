//! Byte source abstraction over already-inflated segment bytes.
//!
//! The container layer locates and inflates segment data; decoding only ever
//! sees materialised bytes, so reads never block.

use crate::decode::{DecodeError, Result};

/// Byte order of multi-byte primitives, fixed once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    #[inline]
    fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }
}

/// Sequential reader over segment bytes.
///
/// Implementors supply the three raw operations; primitive reads are
/// provided on top of them and honour [`ByteSource::byte_order`].
pub trait ByteSource {
    /// Read exactly `len` bytes.
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]>;

    /// Skip `len` bytes.
    fn skip_bytes(&mut self, len: usize) -> Result<()>;

    /// Bytes consumed so far.
    fn position(&self) -> u64;

    fn byte_order(&self) -> ByteOrder;

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let order = self.byte_order();
        let b = self.read_bytes(2)?;
        Ok(order.u16([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let order = self.byte_order();
        let b = self.read_bytes(4)?;
        Ok(order.u32([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a non-negative `i32` count.
    fn read_count(&mut self, what: &'static str) -> Result<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| DecodeError::MalformedHeader(what))
    }

    /// Read `count` words, converted to host order.
    fn read_u32_words(&mut self, count: usize) -> Result<Vec<u32>> {
        let order = self.byte_order();
        let bytes = self.read_bytes(count.checked_mul(4).ok_or(DecodeError::UnexpectedEof)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| order.u32([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read a count-prefixed `u32` vector.
    fn read_vec_u32(&mut self) -> Result<Vec<u32>> {
        let count = self.read_count("vector length")?;
        self.read_u32_words(count)
    }
}

/// [`ByteSource`] over a borrowed slice.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn byte_order(&self) -> ByteOrder {
        self.order
    }
}
