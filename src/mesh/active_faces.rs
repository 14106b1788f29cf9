//! Queue of faces that still have empty vertex slots.
//!
//! Faces are appended when created and marked removed once completed. Removed
//! entries stay in place so split offsets, which count from the end of the
//! raw queue, keep their meaning; only removed entries at the tail are popped.

use super::{Result, TopologyError};

/// Default number of live entries inspected by [`ActiveFaceQueue::next_face`].
pub const DEFAULT_WINDOW: usize = 16;

#[derive(Debug, Clone)]
pub struct ActiveFaceQueue {
    entries: Vec<u32>,
    /// Indexed by face id.
    removed: Vec<bool>,
    window: usize,
}

impl Default for ActiveFaceQueue {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ActiveFaceQueue {
    pub fn new(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            removed: Vec::new(),
            window: window.max(1),
        }
    }

    pub fn push(&mut self, face: u32) {
        let idx = face as usize;
        if self.removed.len() <= idx {
            self.removed.resize(idx + 1, false);
        }
        self.removed[idx] = false;
        self.entries.push(face);
    }

    pub fn mark_removed(&mut self, face: u32) {
        if let Some(flag) = self.removed.get_mut(face as usize) {
            *flag = true;
        }
    }

    pub fn is_removed(&self, face: u32) -> bool {
        self.removed.get(face as usize).copied().unwrap_or(true)
    }

    /// Raw length, removed entries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live face `offset` entries from the end of the raw queue.
    pub fn from_end(&self, offset: i32) -> Result<u32> {
        let out_of_range = TopologyError::SplitOffsetOutOfRange {
            offset,
            len: self.entries.len(),
        };
        let offset = usize::try_from(offset).map_err(|_| out_of_range.clone())?;
        if offset >= self.entries.len() {
            return Err(out_of_range);
        }
        let face = self.entries[self.entries.len() - 1 - offset];
        if self.is_removed(face) {
            return Err(TopologyError::InactiveSplitFace(face));
        }
        Ok(face)
    }

    /// Pick the next face to complete.
    ///
    /// Scans the newest live entries, at most `window` of them, and returns
    /// the one with the fewest empty slots; ties keep the newest.
    pub fn next_face<F>(&mut self, empty_slots: F) -> Option<u32>
    where
        F: Fn(u32) -> u32,
    {
        while let Some(&tail) = self.entries.last() {
            if !self.is_removed(tail) {
                break;
            }
            self.entries.pop();
        }

        let mut best: Option<(u32, u32)> = None;
        for &face in self
            .entries
            .iter()
            .rev()
            .filter(|&&f| !self.is_removed(f))
            .take(self.window)
        {
            let empty = empty_slots(face);
            if best.is_none_or(|(_, e)| empty < e) {
                best = Some((face, empty));
            }
        }
        best.map(|(face, _)| face)
    }
}
