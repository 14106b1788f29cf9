//! Huffman codec for CDP1 streams.
//!
//! Each probability context gets its own tree, built from the occurrence
//! counts with a min-heap. Codes are implied by the tree shape: a `1` bit
//! walks to the left child, a `0` bit to the right child.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::prob_context::{ProbabilityContext, ProbabilityContexts};
use super::{BitReader, DecodeError, Result};

/// Sentinel for "no child".
const NO_NODE: u32 = u32::MAX;

/// Tree node; leaves carry the index of their context entry.
#[derive(Debug, Clone, Copy)]
struct Node {
    left: u32,
    right: u32,
    entry: u32,
}

impl Node {
    fn leaf(entry: u32) -> Self {
        Self {
            left: NO_NODE,
            right: NO_NODE,
            entry,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left == NO_NODE
    }
}

/// Decoding tree for one context, stored as an index arena.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: u32,
}

impl HuffmanTree {
    /// Build the tree for a context.
    ///
    /// Ties in occurrence count are broken by insertion order: entries in
    /// table order first, merged nodes in creation order. The first node
    /// popped becomes the left (`1`) child.
    pub fn build(context: &ProbabilityContext) -> Result<Self> {
        if context.is_empty() {
            return Err(DecodeError::InvalidContext("empty huffman context"));
        }

        let mut nodes: Vec<Node> = (0..context.len() as u32).map(Node::leaf).collect();
        let mut heap: BinaryHeap<Reverse<(u64, u32)>> = context
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| Reverse((u64::from(e.occ_count), i as u32)))
            .collect();

        while heap.len() > 1 {
            let (Some(Reverse((w1, first))), Some(Reverse((w2, second)))) = (heap.pop(), heap.pop())
            else {
                break;
            };
            let parent = nodes.len() as u32;
            nodes.push(Node {
                left: first,
                right: second,
                entry: NO_NODE,
            });
            heap.push(Reverse((w1 + w2, parent)));
        }

        let root = heap
            .pop()
            .map(|Reverse((_, idx))| idx)
            .ok_or(DecodeError::InvalidContext("empty huffman context"))?;
        Ok(Self { nodes, root })
    }

    /// Decode one symbol, returning the context entry index.
    #[inline]
    pub fn decode_entry(&self, reader: &mut BitReader) -> Result<usize> {
        let mut node = self.nodes[self.root as usize];
        while !node.is_leaf() {
            let next = if reader.read_bit()? == 1 {
                node.left
            } else {
                node.right
            };
            node = self.nodes[next as usize];
        }
        Ok(node.entry as usize)
    }

    /// Code length (in bits) assigned to each entry, in table order.
    pub fn code_lengths(&self) -> Vec<u32> {
        let leaves = self.nodes.iter().filter(|n| n.is_leaf()).count();
        let mut lengths = vec![0; leaves];
        let mut stack = vec![(self.root, 0u32)];
        while let Some((idx, depth)) = stack.pop() {
            let node = self.nodes[idx as usize];
            if node.is_leaf() {
                lengths[node.entry as usize] = depth;
            } else {
                stack.push((node.left, depth + 1));
                stack.push((node.right, depth + 1));
            }
        }
        lengths
    }
}

/// Huffman codec state.
#[derive(Debug)]
pub struct HuffmanCodec {
    pub(crate) value_count: usize,
    pub(crate) code_text_bits: u64,
    pub(crate) code: BitReader,
    pub(crate) contexts: ProbabilityContexts,
}

impl HuffmanCodec {
    /// Decode all values; escapes pull from `oob` in order.
    pub fn decode(mut self, oob: &[i32]) -> Result<Vec<i32>> {
        let trees = self
            .contexts
            .tables()
            .iter()
            .map(HuffmanTree::build)
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(self.value_count);
        let mut oob_values = oob.iter();
        let mut current = 0u32;
        for _ in 0..self.value_count {
            let table = self
                .contexts
                .get(current)
                .ok_or(DecodeError::InvalidContext("next context out of range"))?;
            let idx = trees[current as usize].decode_entry(&mut self.code)?;
            let entry = table.entries()[idx];
            let value = if entry.is_escape() {
                *oob_values.next().ok_or(DecodeError::OobExhausted)?
            } else {
                entry.value
            };
            out.push(value);
            current = entry.next_context;
        }

        if self.code.bits_consumed() != self.code_text_bits {
            return Err(DecodeError::CodeTextLength {
                declared: self.code_text_bits,
                consumed: self.code.bits_consumed(),
            });
        }
        Ok(out)
    }
}
