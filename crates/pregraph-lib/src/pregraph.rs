//! Pre-graph store
//!
//! Nodes live in an arena of slots indexed by [`NodeId::index`]; slot 0 is
//! never used so that IDs start at 1. Destroyed nodes leave a tombstone until
//! [`PreGraph::renumber`] compacts the arena.
//!
//! Arcs live in a second arena with a free list. Each arc records the two
//! node ends it joins and is threaded into an intrusive list at each of them,
//! so the arcs leaving an end are found by following `next` links from the
//! end's head. An arc from `A` to `B` is stored with ends `(A, -B)`: walking
//! from end `A` reaches `B`, walking from end `-B` reaches `-A`.

use crate::constants::is_valid_word_length;
use crate::descriptor::Descriptor;
use crate::encoding::EncodingError;
use crate::markers::ReferenceMarker;
use crate::node_id::NodeId;
use std::iter;
use thiserror::Error;

/// Error type for graph construction and integrity checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Word length is even or out of the supported range
    #[error("invalid word length {0}: must be odd and between 3 and 63")]
    InvalidWordLength(usize),
    /// A node sequence cannot hold a single k-mer
    #[error("sequence of {length} symbols is shorter than the word length {word_length}")]
    SequenceTooShort {
        /// Sequence length in symbols
        length: usize,
        /// Word length of the graph
        word_length: usize,
    },
    /// A node sequence contains a byte that is not a nucleotide
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The node does not exist or was destroyed
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    /// Arcs must be backed by at least one observation
    #[error("arc {origin} -> {destination} has zero multiplicity")]
    ZeroMultiplicity {
        /// Origin end
        origin: NodeId,
        /// Destination strand
        destination: NodeId,
    },
    /// Markers were added to a graph built without marker support
    #[error("reference markers are not active on this graph")]
    MarkersInactive,
    /// A marker does not fit on its node
    #[error("marker at offset {offset} with length {length} exceeds node {node} of length {node_length}")]
    MarkerOutOfRange {
        /// Node the marker was attached to
        node: NodeId,
        /// Marker offset on the node
        offset: usize,
        /// Marker length
        length: usize,
        /// Node length in k-mers
        node_length: usize,
    },
    /// Structural invariant violated
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}

/// Index of an arc in the arc arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArcId(u32);

impl ArcId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct PreArc {
    /// The two node ends this arc leaves from
    ends: [NodeId; 2],
    /// Next arc in the list of `ends[0]` and `ends[1]`
    next: [Option<ArcId>; 2],
    multiplicity: u32,
}

impl PreArc {
    /// Which of the two list links belongs to `end`
    #[inline]
    fn end_slot(&self, end: NodeId) -> usize {
        if self.ends[0] == end {
            0
        } else {
            debug_assert_eq!(self.ends[1], end, "arc does not touch end {}", end);
            1
        }
    }
}

/// A double-stranded node
#[derive(Clone, Debug)]
pub struct PreNode {
    /// Forward-strand sequence, `length + k - 1` symbols
    descriptor: Descriptor,
    /// Length in k-mers
    length: usize,
    /// Heads of the arc lists leaving the forward and the reverse strand
    arc_heads: [Option<ArcId>; 2],
    pub(crate) markers: Vec<ReferenceMarker>,
}

impl PreNode {
    /// Length in k-mers
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Forward-strand descriptor
    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Reference markers, in forward-strand coordinates
    #[inline]
    pub fn markers(&self) -> &[ReferenceMarker] {
        &self.markers
    }
}

/// The pre-graph: nodes, arcs and the word length they were built with
#[derive(Clone, Debug)]
pub struct PreGraph {
    nodes: Vec<Option<PreNode>>,
    arcs: Vec<Option<PreArc>>,
    free_arcs: Vec<ArcId>,
    word_length: usize,
    markers_active: bool,
    live_nodes: usize,
    live_arcs: usize,
}

impl PreGraph {
    /// Create an empty graph for word length `word_length`
    ///
    /// # Errors
    /// Returns an error if the word length is even or out of range
    pub fn new(word_length: usize, markers_active: bool) -> Result<Self, GraphError> {
        if !is_valid_word_length(word_length) {
            return Err(GraphError::InvalidWordLength(word_length));
        }
        Ok(Self {
            nodes: vec![None],
            arcs: Vec::new(),
            free_arcs: Vec::new(),
            word_length,
            markers_active,
            live_nodes: 0,
            live_arcs: 0,
        })
    }

    /// Word length (k) the graph was built with
    #[inline]
    pub fn word_length(&self) -> usize {
        self.word_length
    }

    /// Whether reference markers are tracked
    #[inline]
    pub fn markers_active(&self) -> bool {
        self.markers_active
    }

    /// Highest node index in use, including tombstones
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of nodes that have not been destroyed
    #[inline]
    pub fn live_node_count(&self) -> usize {
        self.live_nodes
    }

    /// Number of arcs in the graph
    #[inline]
    pub fn arc_total(&self) -> usize {
        self.live_arcs
    }

    /// Forward handles of all live nodes, in index order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId::forward(index))
    }

    /// Whether the node behind `id` is live
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    /// The node behind `id`, if live
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&PreNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    fn node_ref(&self, id: NodeId) -> &PreNode {
        match self.node(id) {
            Some(node) => node,
            None => panic!("node {} is not live", id),
        }
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PreNode {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("node {} is not live", id),
        }
    }

    /// Length in k-mers of a live node
    ///
    /// # Panics
    /// Panics if the node was destroyed
    #[inline]
    pub fn node_length(&self, id: NodeId) -> usize {
        self.node_ref(id).length
    }

    /// Forward-strand descriptor of a live node
    ///
    /// # Panics
    /// Panics if the node was destroyed
    #[inline]
    pub fn descriptor(&self, id: NodeId) -> &Descriptor {
        &self.node_ref(id).descriptor
    }

    /// Nucleotide sequence read along strand `id`
    ///
    /// # Panics
    /// Panics if the node was destroyed
    pub fn sequence(&self, id: NodeId) -> String {
        let descriptor = self.descriptor(id);
        if id.is_reverse() {
            descriptor.reverse_complement().to_sequence()
        } else {
            descriptor.to_sequence()
        }
    }

    /// Add a node holding `sequence` (at least `k` nucleotides)
    ///
    /// # Errors
    /// Returns an error if the sequence is too short or not nucleotides
    pub fn add_node(&mut self, sequence: &[u8]) -> Result<NodeId, GraphError> {
        if sequence.len() < self.word_length {
            return Err(GraphError::SequenceTooShort {
                length: sequence.len(),
                word_length: self.word_length,
            });
        }
        let descriptor = Descriptor::from_sequence(sequence)?;
        Ok(self.push_node(descriptor))
    }

    /// Add a node from an already packed descriptor
    ///
    /// # Errors
    /// Returns an error if the descriptor holds fewer than `k` symbols
    pub fn add_node_from_descriptor(&mut self, descriptor: Descriptor) -> Result<NodeId, GraphError> {
        if descriptor.len() < self.word_length {
            return Err(GraphError::SequenceTooShort {
                length: descriptor.len(),
                word_length: self.word_length,
            });
        }
        Ok(self.push_node(descriptor))
    }

    fn push_node(&mut self, descriptor: Descriptor) -> NodeId {
        let length = descriptor.len() - (self.word_length - 1);
        self.nodes.push(Some(PreNode {
            descriptor,
            length,
            arc_heads: [None, None],
            markers: Vec::new(),
        }));
        self.live_nodes += 1;
        NodeId::forward(self.nodes.len() - 1)
    }

    /// Add `multiplicity` observations of the arc `origin -> destination`
    ///
    /// If the two ends are already joined, the existing arc's multiplicity
    /// grows instead.
    ///
    /// # Errors
    /// Returns an error if either node is missing or the multiplicity is zero
    pub fn add_arc(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        multiplicity: u32,
    ) -> Result<ArcId, GraphError> {
        for id in [origin, destination] {
            if !self.contains(id) {
                return Err(GraphError::UnknownNode(id));
            }
        }
        if multiplicity == 0 {
            return Err(GraphError::ZeroMultiplicity { origin, destination });
        }
        Ok(self.join(origin, destination, multiplicity))
    }

    /// Create an arc `origin -> destination` carrying the multiplicity of
    /// `template`
    pub fn create_analogous_arc(&mut self, origin: NodeId, destination: NodeId, template: ArcId) -> ArcId {
        let multiplicity = self.multiplicity(template);
        self.join(origin, destination, multiplicity)
    }

    fn join(&mut self, origin: NodeId, destination: NodeId, multiplicity: u32) -> ArcId {
        if let Some(existing) = self.find_arc(origin, destination) {
            let arc = self.arc_mut(existing);
            arc.multiplicity = arc.multiplicity.saturating_add(multiplicity);
            return existing;
        }

        let arc = PreArc {
            ends: [origin, -destination],
            next: [None, None],
            multiplicity,
        };
        let id = match self.free_arcs.pop() {
            Some(id) => {
                self.arcs[id.index()] = Some(arc);
                id
            }
            None => {
                assert!(self.arcs.len() < u32::MAX as usize, "arc arena exhausted");
                self.arcs.push(Some(arc));
                ArcId((self.arcs.len() - 1) as u32)
            }
        };
        self.live_arcs += 1;

        self.link(id, origin);
        // A hairpin (origin -> -origin) leaves the same end twice
        if -destination != origin {
            self.link(id, -destination);
        }
        id
    }

    /// The arc joining `origin` to `destination`, if any
    pub fn find_arc(&self, origin: NodeId, destination: NodeId) -> Option<ArcId> {
        self.arcs(origin).find(|&arc| self.destination(arc, origin) == destination)
    }

    fn link(&mut self, id: ArcId, end: NodeId) {
        let strand = end.strand_slot();
        let head = self.node_ref(end).arc_heads[strand];
        let arc = self.arc_mut(id);
        let slot = arc.end_slot(end);
        arc.next[slot] = head;
        self.node_mut(end).arc_heads[strand] = Some(id);
    }

    fn unlink(&mut self, id: ArcId, end: NodeId) {
        let strand = end.strand_slot();
        let mut previous: Option<ArcId> = None;
        let mut cursor = self.node_ref(end).arc_heads[strand];

        while let Some(current) = cursor {
            let next = self.next_arc(current, end);
            if current == id {
                match previous {
                    None => self.node_mut(end).arc_heads[strand] = next,
                    Some(previous) => {
                        let arc = self.arc_mut(previous);
                        let slot = arc.end_slot(end);
                        arc.next[slot] = next;
                    }
                }
                return;
            }
            previous = Some(current);
            cursor = next;
        }
        panic!("arc {:?} missing from the arc list of end {}", id, end);
    }

    fn remove_arc(&mut self, id: ArcId) {
        let ends = self.arc(id).ends;
        self.unlink(id, ends[0]);
        if ends[1] != ends[0] {
            self.unlink(id, ends[1]);
        }
        self.arcs[id.index()] = None;
        self.free_arcs.push(id);
        self.live_arcs -= 1;
    }

    #[inline]
    fn arc(&self, id: ArcId) -> &PreArc {
        match self.arcs.get(id.index()) {
            Some(Some(arc)) => arc,
            _ => panic!("arc {:?} used after release", id),
        }
    }

    #[inline]
    fn arc_mut(&mut self, id: ArcId) -> &mut PreArc {
        match self.arcs.get_mut(id.index()) {
            Some(Some(arc)) => arc,
            _ => panic!("arc {:?} used after release", id),
        }
    }

    /// First arc leaving `end`
    #[inline]
    pub fn arc_head(&self, end: NodeId) -> Option<ArcId> {
        self.node_ref(end).arc_heads[end.strand_slot()]
    }

    /// Arc following `arc` in the list of `end`
    #[inline]
    pub fn next_arc(&self, arc: ArcId, end: NodeId) -> Option<ArcId> {
        let arc = self.arc(arc);
        arc.next[arc.end_slot(end)]
    }

    /// All arcs leaving `end`
    pub fn arcs(&self, end: NodeId) -> impl Iterator<Item = ArcId> + '_ {
        iter::successors(self.arc_head(end), move |&arc| self.next_arc(arc, end))
    }

    /// Number of arcs leaving `end`
    pub fn arc_count(&self, end: NodeId) -> usize {
        self.arcs(end).count()
    }

    /// Whether exactly one arc leaves `end`
    #[inline]
    pub fn has_single_arc(&self, end: NodeId) -> bool {
        self.arc_head(end)
            .is_some_and(|arc| self.next_arc(arc, end).is_none())
    }

    /// The end of `arc` opposite to `end`
    #[inline]
    pub fn other_end(&self, arc: ArcId, end: NodeId) -> NodeId {
        let arc = self.arc(arc);
        if arc.ends[0] == end {
            arc.ends[1]
        } else {
            arc.ends[0]
        }
    }

    /// Strand reached by following `arc` out of `end`
    #[inline]
    pub fn destination(&self, arc: ArcId, end: NodeId) -> NodeId {
        -self.other_end(arc, end)
    }

    /// Whether both ends of `arc` belong to the same node
    #[inline]
    pub fn is_loop(&self, arc: ArcId) -> bool {
        let arc = self.arc(arc);
        arc.ends[0].index() == arc.ends[1].index()
    }

    /// Number of observations supporting `arc`
    #[inline]
    pub fn multiplicity(&self, arc: ArcId) -> u32 {
        self.arc(arc).multiplicity
    }

    /// Replace the descriptor of node `id` (forward strand) and derive its
    /// length
    pub(crate) fn set_descriptor(&mut self, id: NodeId, descriptor: Descriptor) {
        let overlap = self.word_length - 1;
        assert!(
            descriptor.len() > overlap,
            "descriptor of {} symbols holds no {}-mer",
            descriptor.len(),
            self.word_length
        );
        let node = self.node_mut(id);
        node.length = descriptor.len() - overlap;
        node.descriptor = descriptor;
    }

    /// Destroy a node together with all its arcs and markers
    ///
    /// Handles on the node become invalid until the next renumbering
    /// reassigns IDs.
    ///
    /// # Panics
    /// Panics if the node was already destroyed
    pub fn destroy_node(&mut self, id: NodeId) {
        let index = id.index();
        assert!(self.contains(id), "node {} destroyed twice", id);

        for end in [NodeId::forward(index), NodeId::reverse(index)] {
            while let Some(arc) = self.arc_head(end) {
                self.remove_arc(arc);
            }
        }
        self.nodes[index] = None;
        self.live_nodes -= 1;
    }

    /// Compact live nodes into IDs `1..=live_node_count`
    ///
    /// Relative order and strand pairing are preserved. Returns the new
    /// index of every old index (`None` for destroyed nodes and slot 0).
    /// Any handle held outside the graph is invalidated.
    pub fn renumber(&mut self) -> Vec<Option<usize>> {
        let mut mapping = vec![None; self.nodes.len()];
        let mut next_index = 1;
        for (index, slot) in self.nodes.iter().enumerate().skip(1) {
            if slot.is_some() {
                mapping[index] = Some(next_index);
                next_index += 1;
            }
        }

        for arc in self.arcs.iter_mut().flatten() {
            for end in arc.ends.iter_mut() {
                match mapping[end.index()] {
                    Some(new_index) => *end = end.with_index(new_index),
                    None => panic!("arc end {} points at a destroyed node", end),
                }
            }
        }

        let old_nodes = std::mem::replace(&mut self.nodes, vec![None]);
        self.nodes.extend(old_nodes.into_iter().skip(1).filter(Option::is_some));
        debug_assert_eq!(self.nodes.len() - 1, self.live_nodes);

        mapping
    }

    /// Verify arc symmetry, endpoint liveness and descriptor sizes
    ///
    /// # Errors
    /// Returns a description of the first violation found
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        let overlap = self.word_length - 1;
        let mut memberships = 0usize;

        for (index, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            if index == 0 {
                return Err(GraphError::Inconsistent("slot 0 is occupied".into()));
            }
            let id = NodeId::forward(index);

            if node.descriptor.len() != node.length + overlap {
                return Err(GraphError::Inconsistent(format!(
                    "node {} has length {} but {} descriptor symbols",
                    id,
                    node.length,
                    node.descriptor.len()
                )));
            }
            if let Some(marker) = node.markers.iter().find(|m| m.end() > node.length) {
                return Err(GraphError::MarkerOutOfRange {
                    node: id,
                    offset: marker.node_offset,
                    length: marker.length,
                    node_length: node.length,
                });
            }

            for end in [id, -id] {
                let mut cursor = node.arc_heads[end.strand_slot()];
                let mut steps = 0usize;
                while let Some(arc_id) = cursor {
                    steps += 1;
                    if steps > self.live_arcs {
                        return Err(GraphError::Inconsistent(format!("arc list of end {} is cyclic", end)));
                    }
                    let Some(Some(arc)) = self.arcs.get(arc_id.index()) else {
                        return Err(GraphError::Inconsistent(format!(
                            "end {} lists released arc {:?}",
                            end, arc_id
                        )));
                    };
                    if !arc.ends.contains(&end) {
                        return Err(GraphError::Inconsistent(format!(
                            "end {} lists arc {:?} joining {} and {}",
                            end, arc_id, arc.ends[0], arc.ends[1]
                        )));
                    }
                    let other = if arc.ends[0] == end { arc.ends[1] } else { arc.ends[0] };
                    if !self.contains(other) {
                        return Err(GraphError::Inconsistent(format!(
                            "arc {:?} from {} reaches destroyed node {}",
                            arc_id, end, -other
                        )));
                    }
                    if other != end && !self.arcs(other).any(|a| a == arc_id) {
                        return Err(GraphError::Inconsistent(format!(
                            "arc {:?} is missing from the list of end {}",
                            arc_id, other
                        )));
                    }
                    memberships += 1;
                    cursor = arc.next[arc.end_slot(end)];
                }
            }
        }

        let expected: usize = self
            .arcs
            .iter()
            .flatten()
            .map(|arc| if arc.ends[0] == arc.ends[1] { 1 } else { 2 })
            .sum();
        if expected != memberships {
            return Err(GraphError::Inconsistent(format!(
                "{} arc list entries for {} arcs",
                memberships, self.live_arcs
            )));
        }
        Ok(())
    }
}
