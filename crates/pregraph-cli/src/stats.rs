//! Graph size statistics

use pregraph_lib::PreGraph;
use tracing::info;

/// Node count and contig length distribution of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    /// Live nodes
    pub nodes: usize,
    /// Arcs, each counted once
    pub arcs: usize,
    /// Sum of node lengths, in k-mers
    pub total_length: usize,
    /// Length of the longest node, in k-mers
    pub longest: usize,
    /// Node length at which half of the total length is covered
    pub n50: usize,
}

impl GraphStats {
    /// Collect statistics over the live nodes of `graph`
    pub fn from_graph(graph: &PreGraph) -> Self {
        let mut lengths: Vec<usize> = graph.node_ids().map(|id| graph.node_length(id)).collect();
        let total_length = lengths.iter().sum();
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        Self {
            nodes: lengths.len(),
            arcs: graph.arc_total(),
            total_length,
            longest: lengths.first().copied().unwrap_or(0),
            n50: n50(&lengths, total_length),
        }
    }

    /// Log the statistics under `label`
    pub fn print(&self, label: &str) {
        info!("{}:", label);
        info!("  nodes = {}", self.nodes);
        info!("  arcs = {}", self.arcs);
        info!("  total length = {} k-mers", self.total_length);
        info!("  longest = {}", self.longest);
        info!("  N50 = {}", self.n50);
    }
}

/// Length at which the longest-first cumulative sum reaches half the total
///
/// `sorted` must be in decreasing order.
fn n50(sorted: &[usize], total: usize) -> usize {
    let mut cumulative = 0;
    for &length in sorted {
        cumulative += length;
        if 2 * cumulative >= total {
            return length;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n50() {
        assert_eq!(n50(&[], 0), 0);
        assert_eq!(n50(&[10], 10), 10);
        assert_eq!(n50(&[8, 4, 3, 2, 1], 18), 4);
        assert_eq!(n50(&[5, 5, 5, 5], 20), 5);
    }

    #[test]
    fn test_from_graph() {
        let mut graph = PreGraph::new(3, false).unwrap();
        let a = graph.add_node(b"ACGTAC").unwrap();
        let b = graph.add_node(b"ACG").unwrap();
        graph.add_arc(a, b, 1).unwrap();
        let stats = GraphStats::from_graph(&graph);
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.arcs, 1);
        assert_eq!(stats.total_length, 5);
        assert_eq!(stats.longest, 4);
        assert_eq!(stats.n50, 4);
    }
}
