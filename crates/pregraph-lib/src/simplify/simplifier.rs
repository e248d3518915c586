//! Simplification orchestration
//!
//! Runs the pipeline on a pre-graph in place:
//! 1. Clip short tips, repeating until stable (optional)
//! 2. Contract singleton chains
//! 3. Renumber node IDs densely

use crate::{
    pregraph::PreGraph,
    simplify::{
        clip_tips::clip_tips_with_cutoff,
        concatenate::{concatenate_pregraph, concatenate_pregraph_parallel},
        config::SimplifyConfiguration,
    },
};
use tracing::info;

/// What a simplification run did to the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyReport {
    /// Live nodes before the run
    pub initial_nodes: usize,
    /// Nodes destroyed as tips
    pub tips_clipped: usize,
    /// Nodes folded into a neighbour
    pub absorbed: usize,
    /// Merges deferred by claim contention and completed sequentially
    pub deferred: usize,
    /// Live nodes after the run
    pub remaining_nodes: usize,
}

/// Pre-graph simplifier
pub struct Simplifier {
    config: SimplifyConfiguration,
}

impl Simplifier {
    /// Create a new simplifier with the given configuration
    pub fn new(config: SimplifyConfiguration) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this simplifier runs with
    pub fn config(&self) -> &SimplifyConfiguration {
        &self.config
    }

    /// Simplify `graph` in place
    ///
    /// # Parallelism
    /// The number of threads is controlled by `config.num_threads`:
    /// - `0`: use all available CPU cores (rayon default)
    /// - `1`: single-threaded, no locking and no thread pool
    /// - `N`: use exactly N threads
    ///
    /// Both modes yield the same contigs; node numbering may differ.
    pub fn simplify(&self, graph: &mut PreGraph) -> Result<SimplifyReport, String> {
        if !self.config.is_parallel() {
            return Ok(self.simplify_inner(graph));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| format!("Failed to create thread pool: {e}"))?;

        Ok(pool.install(|| self.simplify_inner(graph)))
    }

    /// Inner pipeline, runs inside the thread pool when parallel
    fn simplify_inner(&self, graph: &mut PreGraph) -> SimplifyReport {
        if self.config.verbose {
            self.config.print();
        }
        let parallel = self.config.is_parallel();
        let initial_nodes = graph.live_node_count();
        info!(
            "Simplifying preGraph: {} nodes, {} arcs, k = {}",
            initial_nodes,
            graph.arc_total(),
            graph.word_length()
        );

        let (tips_clipped, concatenation) = if self.config.clip_tips {
            let cutoff_length = self.config.tip_length_factor * graph.word_length();
            let report = clip_tips_with_cutoff(graph, cutoff_length, parallel);
            (report.clipped, report.concatenation)
        } else if parallel {
            (0, concatenate_pregraph_parallel(graph))
        } else {
            (0, concatenate_pregraph(graph))
        };

        info!("Simplification Complete");
        SimplifyReport {
            initial_nodes,
            tips_clipped,
            absorbed: concatenation.absorbed,
            deferred: concatenation.deferred,
            remaining_nodes: concatenation.remaining,
        }
    }
}
