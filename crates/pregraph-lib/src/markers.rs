//! Reference markers
//!
//! A marker ties `length` k-mers of a node, starting at `node_offset` on the
//! node's forward strand, to the interval `[reference_start,
//! reference_start + length)` of an external reference sequence. Markers are
//! produced by the alignment collaborator; contraction only moves them from
//! one node to another.

use crate::node_id::NodeId;
use crate::pregraph::{GraphError, PreGraph};

/// A reference interval mapped onto a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceMarker {
    /// Reference sequence the interval belongs to
    pub reference_id: u32,
    /// First reference position covered
    pub reference_start: u64,
    /// First k-mer covered, on the node's forward strand
    pub node_offset: usize,
    /// Number of k-mers covered
    pub length: usize,
    /// The reference aligns to the node's reverse strand
    pub reverse: bool,
}

impl ReferenceMarker {
    /// Marker aligned to the forward strand of its node
    pub fn new(reference_id: u32, reference_start: u64, node_offset: usize, length: usize) -> Self {
        Self {
            reference_id,
            reference_start,
            node_offset,
            length,
            reverse: false,
        }
    }

    /// One past the last node k-mer covered
    #[inline]
    pub fn end(&self) -> usize {
        self.node_offset + self.length
    }

    /// The same marker expressed on the other strand of a node of
    /// `node_length` k-mers
    #[inline]
    pub fn mirrored(self, node_length: usize) -> Self {
        Self {
            node_offset: node_length - self.end(),
            reverse: !self.reverse,
            ..self
        }
    }

    /// The same marker moved `offset` k-mers further along the node
    #[inline]
    pub fn shifted(self, offset: usize) -> Self {
        Self {
            node_offset: self.node_offset + offset,
            ..self
        }
    }
}

impl PreGraph {
    /// Attach a marker to strand `node`
    ///
    /// Markers given on a reverse strand are stored mirrored onto the
    /// forward strand.
    ///
    /// # Errors
    /// Returns an error if markers are inactive, the node is missing or the
    /// marker does not fit on it
    pub fn add_marker(&mut self, node: NodeId, marker: ReferenceMarker) -> Result<(), GraphError> {
        if !self.markers_active() {
            return Err(GraphError::MarkersInactive);
        }
        let Some(node_length) = self.node(node).map(|n| n.length()) else {
            return Err(GraphError::UnknownNode(node));
        };
        if marker.end() > node_length {
            return Err(GraphError::MarkerOutOfRange {
                node,
                offset: marker.node_offset,
                length: marker.length,
                node_length,
            });
        }
        let marker = if node.is_reverse() {
            marker.mirrored(node_length)
        } else {
            marker
        };
        self.node_mut(node).markers.push(marker);
        Ok(())
    }

    /// Markers of a live node, in forward-strand coordinates
    ///
    /// # Panics
    /// Panics if the node was destroyed
    pub fn markers(&self, node: NodeId) -> &[ReferenceMarker] {
        match self.node(node) {
            Some(n) => n.markers(),
            None => panic!("node {} is not live", node),
        }
    }

    /// Move every marker of `source` onto `target`
    ///
    /// `source` is the strand as it is laid out inside the forward strand of
    /// `target`, starting `offset` k-mers in. Markers of a reverse-strand
    /// source are mirrored first. Reference coordinates never change.
    ///
    /// Must run before `source` or `target` gets its new descriptor. Does
    /// nothing when markers are inactive.
    pub fn fold_markers(&mut self, target: NodeId, source: NodeId, offset: usize) {
        if !self.markers_active() {
            return;
        }
        let source_length = self.node_length(source);
        let moved = std::mem::take(&mut self.node_mut(source).markers);
        let rebased = moved.into_iter().map(|marker| {
            let marker = if source.is_reverse() {
                marker.mirrored(source_length)
            } else {
                marker
            };
            marker.shifted(offset)
        });
        self.node_mut(target).markers.extend(rebased);
    }
}
