//! Writers for building encoded fixtures in tests.

use crate::source::ByteOrder;

/// MSB-first bit packer producing zero-padded 32-bit words.
#[derive(Debug, Default)]
pub struct BitWriter {
    words: Vec<u32>,
    current: u64,
    bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `nbits` (0..=32) bits of `value`.
    pub fn write(&mut self, value: u32, nbits: u32) {
        assert!(nbits <= 32);
        if nbits == 0 {
            return;
        }
        let masked = u64::from(value) & ((1u64 << nbits) - 1);
        self.current = (self.current << nbits) | masked;
        self.bits += nbits;
        if self.bits >= 32 {
            self.bits -= 32;
            self.words.push((self.current >> self.bits) as u32);
            self.current &= (1u64 << self.bits) - 1;
        }
    }

    pub fn write_i32(&mut self, value: i32, nbits: u32) {
        self.write(value as u32, nbits);
    }

    /// Bits written so far.
    pub fn len(&self) -> u64 {
        self.words.len() as u64 * 32 + u64::from(self.bits)
    }

    pub fn finish(mut self) -> Vec<u32> {
        if self.bits > 0 {
            self.words.push((self.current << (32 - self.bits)) as u32);
        }
        self.words
    }
}

/// Byte buffer writer honouring a file byte order.
#[derive(Debug)]
pub struct ByteWriter {
    order: ByteOrder,
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            bytes: Vec::new(),
        }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.u32(v as u32)
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.u32(v.to_bits())
    }

    /// Raw words without a count prefix.
    pub fn words(&mut self, words: &[u32]) -> &mut Self {
        for &w in words {
            self.u32(w);
        }
        self
    }

    /// Count-prefixed word vector.
    pub fn vec_u32(&mut self, words: &[u32]) -> &mut Self {
        self.i32(words.len() as i32);
        self.words(words)
    }

    /// CDP2 stream using the Null codec.
    pub fn cdp2_null(&mut self, values: &[i32]) -> &mut Self {
        self.i32(values.len() as i32);
        if !values.is_empty() {
            self.u8(0);
            let words: Vec<u32> = values.iter().map(|&v| v as u32).collect();
            self.vec_u32(&words);
        }
        self
    }

    /// CDP2 stream using Bitlength2 over pre-packed code text.
    pub fn cdp2_bitlength(&mut self, value_count: usize, code: BitWriter) -> &mut Self {
        let bits = code.len();
        self.i32(value_count as i32);
        self.u8(1);
        self.i32(bits as i32);
        self.vec_u32(&code.finish())
    }

    /// CDP1 stream using the Null codec.
    pub fn cdp1_null(&mut self, values: &[i32]) -> &mut Self {
        self.u8(0);
        self.i32(values.len() as i32 * 32);
        self.i32(values.len() as i32);
        let words: Vec<u32> = values.iter().map(|&v| v as u32).collect();
        self.vec_u32(&words)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_packs_msb_first() {
        let mut bits = BitWriter::new();
        bits.write(0b101, 3);
        bits.write(u32::MAX, 32);
        assert_eq!(bits.len(), 35);
        assert_eq!(bits.finish(), vec![0xBFFF_FFFF, 0xE000_0000]);
    }
}
