//! Deterministic synthetic pre-graphs
//!
//! Each chain is a random contig cut into nodes that overlap by `k - 1`
//! symbols and are linked in order with strong arcs. Optionally some nodes
//! are stored on their reverse strand, and short weak tips are attached to
//! interior nodes. Simplifying such a graph with a tip cutoff above
//! `tip_length` must give back exactly one node per chain, holding the
//! contig on one of its strands.
//!
//! Chains shorter than the tip cutoff are clipped as isolated snippets.

use crate::constants::is_valid_word_length;
use crate::encoding::reverse_complement;
use crate::markers::ReferenceMarker;
use crate::node_id::NodeId;
use crate::pregraph::{GraphError, PreGraph};

/// Shape of a synthetic graph
#[derive(Debug, Clone)]
pub struct SyntheticGraphConfig {
    /// Word length (k)
    pub word_length: usize,
    /// Number of independent chains
    pub chains: usize,
    /// Nodes each chain is cut into
    pub nodes_per_chain: usize,
    /// Length of every chain node, in k-mers
    pub node_length: usize,
    /// Weak tips attached to each chain
    pub tips_per_chain: usize,
    /// Length of every tip, in k-mers
    pub tip_length: usize,
    /// Multiplicity of the arcs along a chain (tips get 1)
    pub chain_multiplicity: u32,
    /// Store about half the chain nodes on their reverse strand
    pub mixed_strands: bool,
    /// Attach a reference marker covering each chain node
    pub markers: bool,
    /// Seed of the generator
    pub seed: u64,
}

impl Default for SyntheticGraphConfig {
    fn default() -> Self {
        Self {
            word_length: 21,
            chains: 100,
            nodes_per_chain: 10,
            node_length: 30,
            tips_per_chain: 2,
            tip_length: 5,
            chain_multiplicity: 4,
            mixed_strands: true,
            markers: false,
            seed: 42,
        }
    }
}

/// A generated graph and the contig each chain spells, indexed by chain
#[derive(Debug, Clone)]
pub struct SyntheticGraph {
    /// The graph before simplification
    pub graph: PreGraph,
    /// Chain contigs; marker reference IDs index this list
    pub contigs: Vec<String>,
}

/// Simple LCG random
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.0 >> 33
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }

    fn bases(&mut self, count: usize) -> String {
        (0..count).map(|_| ['A', 'C', 'G', 'T'][self.below(4)]).collect()
    }
}

impl SyntheticGraphConfig {
    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_word_length(self.word_length) {
            return Err(format!(
                "word_length = {} must be odd and between 3 and 63",
                self.word_length
            ));
        }
        if self.nodes_per_chain == 0 || self.node_length == 0 {
            return Err("chains need at least one node of at least one k-mer".to_string());
        }
        if self.tips_per_chain > 0 && self.tip_length == 0 {
            return Err("tip_length must be at least 1".to_string());
        }
        if self.tips_per_chain > 0 && self.nodes_per_chain < 2 {
            return Err("tips need chains of at least 2 nodes".to_string());
        }
        if self.chain_multiplicity < 2 {
            return Err("chain_multiplicity must be at least 2 to outweigh tips".to_string());
        }
        Ok(())
    }

    /// Generate the graph
    pub fn build(&self) -> Result<SyntheticGraph, String> {
        self.validate()?;
        self.generate().map_err(|e| format!("Failed to generate graph: {e}"))
    }

    fn generate(&self) -> Result<SyntheticGraph, GraphError> {
        let k = self.word_length;
        let mut graph = PreGraph::new(k, self.markers)?;
        let mut rng = Lcg(self.seed);
        let mut contigs = Vec::with_capacity(self.chains);

        for chain in 0..self.chains {
            let contig = rng.bases(self.nodes_per_chain * self.node_length + k - 1);

            let mut handles: Vec<NodeId> = Vec::with_capacity(self.nodes_per_chain);
            for i in 0..self.nodes_per_chain {
                let start = i * self.node_length;
                let piece = &contig[start..start + self.node_length + k - 1];
                let handle = if self.mixed_strands && rng.below(2) == 1 {
                    -graph.add_node(reverse_complement(piece).as_bytes())?
                } else {
                    graph.add_node(piece.as_bytes())?
                };
                if self.markers {
                    let marker = ReferenceMarker::new(chain as u32, start as u64, 0, self.node_length);
                    graph.add_marker(handle, marker)?;
                }
                handles.push(handle);
            }
            for pair in handles.windows(2) {
                graph.add_arc(pair[0], pair[1], self.chain_multiplicity)?;
            }

            for _ in 0..self.tips_per_chain {
                // Never on the first node, so the tip meets a real branch point
                let junction = 1 + rng.below(self.nodes_per_chain - 1);
                let anchor = junction * self.node_length;
                let mut tip = rng.bases(self.tip_length);
                tip.push_str(&contig[anchor..anchor + k - 1]);
                let id = graph.add_node(tip.as_bytes())?;
                graph.add_arc(id, handles[junction], 1)?;
            }

            contigs.push(contig);
        }

        Ok(SyntheticGraph { graph, contigs })
    }
}
