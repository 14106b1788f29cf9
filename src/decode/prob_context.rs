//! Probability context tables for the Huffman and arithmetic codecs.
//!
//! A context is a list of `(symbol, occurrence count, value, next context)`
//! entries. Decoding starts in context 0 and each decoded entry names the
//! context used for the following symbol. Symbol `-2` is the out-of-band
//! escape: the real value is taken from the OOB side stream.
//!
//! Both layouts are bit packed and read in raw mode straight from the
//! segment bytes:
//!
//! | Field | Mk1 bits | Mk2 bits |
//! |-------|----------|----------|
//! | entry count | 32 | 16 |
//! | symbol bits | 6 | 6 |
//! | occurrence count bits | 6 | 6 |
//! | value bits | 6 | 6 |
//! | next context bits | 6 | - (0) |
//! | min value | 32 | 32 |

use super::{BitReader, DecodeError, Result};
use crate::source::ByteSource;

/// Symbol marking an escape to the OOB stream.
pub const ESCAPE_SYMBOL: i32 = -2;

/// Stored symbols are biased so that the escape is representable unsigned.
const SYMBOL_BIAS: i32 = 2;

/// Largest total count the 16-bit arithmetic coder can represent.
pub const MAX_TOTAL_COUNT: u32 = 0xFFFF;

/// Upper bound on entries per table; guards allocation on corrupt input.
const MAX_ENTRIES: u32 = 1 << 20;

/// One probability context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEntry {
    pub symbol: i32,
    pub occ_count: u32,
    pub value: i32,
    pub next_context: u32,
}

impl ContextEntry {
    #[inline]
    pub fn is_escape(&self) -> bool {
        self.symbol == ESCAPE_SYMBOL
    }
}

/// A single context table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbabilityContext {
    entries: Vec<ContextEntry>,
    total_count: u32,
}

impl ProbabilityContext {
    pub fn new(entries: Vec<ContextEntry>) -> Self {
        let total_count = entries
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.occ_count));
        Self {
            entries,
            total_count,
        }
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all occurrence counts.
    pub fn total_count(&self) -> u32 {
        self.total_count
    }
}

/// Field widths shared by every entry of one table.
#[derive(Debug, Clone, Copy)]
struct EntryLayout {
    symbol_bits: u32,
    occ_bits: u32,
    value_bits: u32,
    next_bits: u32,
    min_value: i32,
}

impl EntryLayout {
    fn validate(&self) -> Result<()> {
        let widths = [self.symbol_bits, self.occ_bits, self.value_bits, self.next_bits];
        if widths.iter().any(|&w| w > 32) {
            return Err(DecodeError::InvalidContext("field width exceeds 32 bits"));
        }
        if self.symbol_bits == 0 || self.occ_bits == 0 {
            return Err(DecodeError::InvalidContext("zero symbol or count width"));
        }
        Ok(())
    }

    fn entry_bits(&self) -> u64 {
        u64::from(self.symbol_bits + self.occ_bits + self.value_bits + self.next_bits)
    }

    fn read_entries<S: ByteSource + ?Sized>(
        &self,
        bits: &mut BitReader,
        source: &mut S,
        count: u32,
    ) -> Result<Vec<ContextEntry>> {
        bits.load_raw(source, self.entry_bits() * u64::from(count))?;
        (0..count)
            .map(|_| {
                let symbol = bits.read_u32(self.symbol_bits)? as i32 - SYMBOL_BIAS;
                let occ_count = bits.read_u32(self.occ_bits)?;
                let value = bits
                    .read_u32_or_0(self.value_bits)?
                    .wrapping_add(self.min_value as u32) as i32;
                let next_context = bits.read_u32_or_0(self.next_bits)?;
                Ok(ContextEntry {
                    symbol,
                    occ_count,
                    value,
                    next_context,
                })
            })
            .collect()
    }
}

/// Header bits of one Mk1 table (count, four widths, min value).
const MK1_HEADER_BITS: u64 = 32 + 4 * 6 + 32;
/// Header bits of the Mk2 table (count, three widths, min value).
const MK2_HEADER_BITS: u64 = 16 + 3 * 6 + 32;

/// An ordered set of contexts linked through `next_context`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbabilityContexts {
    tables: Vec<ProbabilityContext>,
}

impl ProbabilityContexts {
    pub fn new(tables: Vec<ProbabilityContext>) -> Result<Self> {
        let contexts = Self { tables };
        contexts.validate()?;
        Ok(contexts)
    }

    fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(DecodeError::InvalidContext("no context tables"));
        }
        let count = self.tables.len() as u32;
        for table in &self.tables {
            if table.is_empty() {
                return Err(DecodeError::InvalidContext("empty context table"));
            }
            if table.entries.iter().any(|e| e.next_context >= count) {
                return Err(DecodeError::InvalidContext("next context out of range"));
            }
        }
        Ok(())
    }

    /// Read a Mk1 chain: `u8` table count, then the bit-packed tables.
    pub fn read_mk1<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        let table_count = source.read_u8()?;
        if table_count == 0 {
            return Err(DecodeError::InvalidContext("zero table count"));
        }

        let mut bits = BitReader::default();
        let mut tables = Vec::with_capacity(usize::from(table_count));
        for _ in 0..table_count {
            bits.load_raw(source, MK1_HEADER_BITS)?;
            let entry_count = bits.read_u32(32)?;
            if entry_count > MAX_ENTRIES {
                return Err(DecodeError::InvalidContext("entry count too large"));
            }
            let layout = EntryLayout {
                symbol_bits: bits.read_u32(6)?,
                occ_bits: bits.read_u32(6)?,
                value_bits: bits.read_u32(6)?,
                next_bits: bits.read_u32(6)?,
                min_value: bits.read_i32(32)?,
            };
            layout.validate()?;
            let entries = layout.read_entries(&mut bits, source, entry_count)?;
            tables.push(ProbabilityContext::new(entries));
        }
        bits.discard_partial_word();

        tracing::trace!(tables = tables.len(), "read mk1 probability contexts");
        Self::new(tables)
    }

    /// Read a single Mk2 table.
    pub fn read_mk2<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self> {
        let mut bits = BitReader::default();
        bits.load_raw(source, MK2_HEADER_BITS)?;
        let entry_count = bits.read_u32(16)?;
        let layout = EntryLayout {
            symbol_bits: bits.read_u32(6)?,
            occ_bits: bits.read_u32(6)?,
            value_bits: bits.read_u32(6)?,
            next_bits: 0,
            min_value: bits.read_i32(32)?,
        };
        layout.validate()?;
        let entries = layout.read_entries(&mut bits, source, entry_count)?;
        bits.discard_partial_word();

        Self::new(vec![ProbabilityContext::new(entries)])
    }

    pub fn get(&self, index: u32) -> Option<&ProbabilityContext> {
        self.tables.get(index as usize)
    }

    pub fn tables(&self) -> &[ProbabilityContext] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whether any entry escapes to the OOB stream.
    pub fn has_escape(&self) -> bool {
        self.tables
            .iter()
            .any(|t| t.entries.iter().any(ContextEntry::is_escape))
    }
}
