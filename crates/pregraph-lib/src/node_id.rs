//! Signed node handles
//!
//! A node is stored once but can be entered on either strand. `+id` names
//! the forward strand, `-id` the reverse complement. Both handles address
//! the same storage slot; the sign only selects the view.
//!
//! Handles also name node *ends*: the end `id` is the terminus that arcs
//! leave from when walking along strand `id`.

use std::fmt;
use std::ops::Neg;

/// Signed handle on a node strand
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(i32);

impl NodeId {
    /// Forward-strand handle of the node stored at `index` (>= 1)
    ///
    /// # Panics
    /// Panics if `index` is 0 or does not fit a signed 32-bit ID
    #[inline]
    pub fn forward(index: usize) -> Self {
        match i32::try_from(index) {
            Ok(raw) if raw >= 1 => Self(raw),
            _ => panic!("node index {} out of range", index),
        }
    }

    /// Reverse-strand handle of the node stored at `index` (>= 1)
    #[inline]
    pub fn reverse(index: usize) -> Self {
        -Self::forward(index)
    }

    /// Handle from a raw signed ID (must be non-zero)
    #[inline]
    pub fn from_raw(id: i32) -> Self {
        assert!(id != 0, "node ID 0 is reserved");
        Self(id)
    }

    /// Raw signed ID
    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Storage index shared by both strands
    #[inline]
    pub fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Whether this handle views the reverse strand
    #[inline]
    pub fn is_reverse(self) -> bool {
        self.0 < 0
    }

    /// Whether this handle views the forward strand
    #[inline]
    pub fn is_forward(self) -> bool {
        self.0 > 0
    }

    /// Slot of this strand in per-node arrays (0 forward, 1 reverse)
    #[inline]
    pub(crate) fn strand_slot(self) -> usize {
        usize::from(self.is_reverse())
    }

    /// Same strand orientation, different storage index
    #[inline]
    pub fn with_index(self, index: usize) -> Self {
        if self.is_reverse() {
            Self::reverse(index)
        } else {
            Self::forward(index)
        }
    }
}

impl Neg for NodeId {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
