//! Hash-chain match finder over a contiguous search buffer.
//!
//! The buffer holds the carried-over dictionary window (if any) followed by
//! the block being encoded. Positions are inserted as encoding advances, so a
//! lookup only ever sees earlier positions.

use crate::error::{Error, Result};

/// Shortest back-reference worth coding.
pub(crate) const MIN_MATCH: usize = 3;

/// Longest back-reference a single match symbol can describe.
pub(crate) const MAX_MATCH: usize = 258;

const HASH_BITS: u32 = 16;
const HASH_MULT: u32 = 2_654_435_761;
const NO_POS: u32 = u32::MAX;

pub(crate) struct MatchFinder<'a> {
    buffer: &'a [u8],
    head: Vec<u32>,
    prev: Vec<u32>,
    max_dist: usize,
    depth: u32,
    nice_len: usize,
}

impl<'a> MatchFinder<'a> {
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] when the chain-link table for
    /// `buffer` cannot be allocated.
    pub(crate) fn new(
        buffer: &'a [u8],
        dict_size: u32,
        depth: u32,
        nice_len: u32,
    ) -> Result<Self> {
        let mut prev = Vec::new();
        prev.try_reserve_exact(buffer.len())
            .map_err(|_| Error::AllocationFailed {
                capacity: buffer.len() * std::mem::size_of::<u32>(),
            })?;
        prev.resize(buffer.len(), NO_POS);

        Ok(Self {
            buffer,
            head: vec![NO_POS; 1 << HASH_BITS],
            prev,
            max_dist: dict_size as usize,
            depth,
            nice_len: (nice_len as usize).min(MAX_MATCH),
        })
    }

    fn hash(&self, pos: usize) -> usize {
        let key = u32::from(self.buffer[pos])
            | u32::from(self.buffer[pos + 1]) << 8
            | u32::from(self.buffer[pos + 2]) << 16;
        (key.wrapping_mul(HASH_MULT) >> (32 - HASH_BITS)) as usize
    }

    /// Links `pos` into its hash chain so later positions can match it.
    pub(crate) fn insert(&mut self, pos: usize) {
        if pos + MIN_MATCH > self.buffer.len() {
            return;
        }
        let slot = self.hash(pos);
        self.prev[pos] = self.head[slot];
        self.head[slot] = pos as u32;
    }

    /// Finds the longest match for `pos` among previously inserted positions.
    ///
    /// Returns `(length, distance)` with `length >= MIN_MATCH` and
    /// `distance <= dict_size`, or `None` when nothing qualifies. The chain
    /// walk is bounded by the preset's depth, and a match reaching `nice_len`
    /// is taken immediately.
    pub(crate) fn best_match(&self, pos: usize) -> Option<(usize, usize)> {
        let limit = (self.buffer.len() - pos).min(MAX_MATCH);
        if limit < MIN_MATCH {
            return None;
        }

        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0usize;
        let mut candidate = self.head[self.hash(pos)];
        let mut steps = self.depth;

        while candidate != NO_POS && steps > 0 {
            let cand = candidate as usize;
            let dist = pos - cand;
            if dist > self.max_dist {
                break;
            }

            // Cheap reject: a longer match must improve on the current best
            // at its last byte.
            if self.buffer[cand + best_len] == self.buffer[pos + best_len] {
                let mut len = 0;
                while len < limit && self.buffer[cand + len] == self.buffer[pos + len] {
                    len += 1;
                }
                if len > best_len {
                    best_len = len;
                    best_dist = dist;
                    if len >= self.nice_len || len == limit {
                        break;
                    }
                }
            }

            candidate = self.prev[cand];
            steps -= 1;
        }

        if best_len >= MIN_MATCH {
            Some((best_len, best_dist))
        } else {
            None
        }
    }
}
