//! Per-node claim table for parallel contraction
//!
//! One bit per node index, packed into atomic 64-bit words. Claiming never
//! waits: a worker that finds a node already claimed gives up on the merge
//! and leaves it for a later sweep. Since nobody ever blocks on a claim,
//! claims cannot deadlock against each other or against the graph lock.
//!
//! A table is created for a single contraction pass and dropped with it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Bit-per-node claim table
#[derive(Debug)]
pub struct ClaimTable {
    words: Vec<AtomicU64>,
    capacity: usize,
}

impl ClaimTable {
    /// Table for node indices `0..capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            words: (0..capacity.div_ceil(64)).map(|_| AtomicU64::new(0)).collect(),
            capacity,
        }
    }

    #[inline]
    fn locate(&self, index: usize) -> (&AtomicU64, u64) {
        assert!(
            index < self.capacity,
            "claim on node {} outside a table of {}",
            index,
            self.capacity
        );
        (&self.words[index / 64], 1u64 << (index % 64))
    }

    /// Claim node `index`
    ///
    /// Returns `true` if the node was already claimed (contended); the
    /// caller then owns nothing and must back off. Returns `false` once the
    /// claim is taken.
    #[inline]
    pub fn try_claim(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        word.fetch_or(mask, Ordering::AcqRel) & mask != 0
    }

    /// Release a claim on node `index`
    #[inline]
    pub fn release(&self, index: usize) {
        let (word, mask) = self.locate(index);
        word.fetch_and(!mask, Ordering::Release);
    }

    /// Whether node `index` is currently claimed
    #[inline]
    pub fn is_claimed(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        word.load(Ordering::Acquire) & mask != 0
    }

    /// Claim both `first` and `second`, or neither
    ///
    /// The returned guard releases both claims when dropped.
    pub fn claim_pair(&self, first: usize, second: usize) -> Option<PairClaim<'_>> {
        if self.try_claim(first) {
            return None;
        }
        if second != first && self.try_claim(second) {
            self.release(first);
            return None;
        }
        Some(PairClaim {
            table: self,
            first,
            second,
        })
    }
}

/// Claims on a node and its merge partner, released on drop
#[derive(Debug)]
pub struct PairClaim<'a> {
    table: &'a ClaimTable,
    first: usize,
    second: usize,
}

impl Drop for PairClaim<'_> {
    fn drop(&mut self) {
        self.table.release(self.first);
        if self.second != self.first {
            self.table.release(self.second);
        }
    }
}
