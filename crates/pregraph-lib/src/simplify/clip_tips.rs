//! Tip clipping
//!
//! A tip is a short dead-end path hanging off a branch point. Starting from
//! a strand end with no outgoing arcs, the scan walks back through
//! unbranched nodes until it meets a branch point, accumulating k-mer
//! lengths. The node is clipped when the path is shorter than the cutoff and
//! its arc into the branch point is weak: multiplicity 1, or strictly below
//! the strongest competing arc. A dead-end path that never meets a branch
//! point is an isolated snippet and is clipped as well.
//!
//! Clipping repeats until a full scan removes nothing, then the graph is
//! contracted.

use crate::constants::DEFAULT_TIP_LENGTH_FACTOR;
use crate::node_id::NodeId;
use crate::pregraph::PreGraph;
use crate::simplify::concatenate::{concatenate_pregraph, concatenate_pregraph_parallel, ConcatenationReport};
use rayon::prelude::*;
use tracing::{debug, info};

/// Summary of a clipping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipReport {
    /// Nodes destroyed as tips
    pub clipped: usize,
    /// Full scans performed, the last one removing nothing
    pub rounds: usize,
    /// The contraction run after clipping
    pub concatenation: ConcatenationReport,
}

/// Whether at least two arcs leave `end`
#[inline]
fn branches(graph: &PreGraph, end: NodeId) -> bool {
    graph.arc_head(end).is_some_and(|arc| graph.next_arc(arc, end).is_some())
}

/// Whether the node behind `end` is a clippable tip, entered from `end`
///
/// `end` must have no outgoing arcs. Paths of `cutoff_length` k-mers or more
/// are never tips.
///
/// # Panics
/// Panics if the node was destroyed
pub fn is_eligible_tip(graph: &PreGraph, end: NodeId, cutoff_length: usize) -> bool {
    if graph.arc_head(end).is_some() {
        return false;
    }

    let mut total_length = 0;
    let mut current = Some(-end);
    let mut active_arc = None;
    while let Some(node) = current {
        if branches(graph, -node) || branches(graph, node) {
            break;
        }
        total_length += graph.node_length(node);
        if total_length >= cutoff_length {
            return false;
        }
        active_arc = graph.arc_head(node);
        current = active_arc.map(|arc| graph.destination(arc, node));
    }

    // Ran off a dead end: isolated snippet
    let Some(junction) = current else {
        return true;
    };
    // Stopped on an outgoing branch, not a merge point
    if !branches(graph, -junction) {
        return false;
    }
    let Some(active_arc) = active_arc else {
        return false;
    };

    let multiplicity = graph.multiplicity(active_arc);
    if multiplicity == 1 {
        return true;
    }
    let strongest = graph
        .arcs(-junction)
        .map(|arc| graph.multiplicity(arc))
        .max()
        .unwrap_or(0);
    strongest > multiplicity
}

/// Whether node `index` is live and a tip from either strand
fn is_tip_node(graph: &PreGraph, index: usize, cutoff_length: usize) -> bool {
    let id = NodeId::forward(index);
    graph.contains(id) && (is_eligible_tip(graph, id, cutoff_length) || is_eligible_tip(graph, -id, cutoff_length))
}

/// Scan and destroy in one pass, repeated until stable
fn clip_sequential(graph: &mut PreGraph, cutoff_length: usize) -> (usize, usize) {
    let mut clipped = 0;
    let mut rounds = 0;
    loop {
        rounds += 1;
        let before = clipped;
        for index in 1..=graph.node_count() {
            if is_tip_node(graph, index, cutoff_length) {
                graph.destroy_node(NodeId::forward(index));
                clipped += 1;
            }
        }
        debug!("  round {}: {} tips", rounds, clipped - before);
        if clipped == before {
            return (clipped, rounds);
        }
    }
}

/// Find candidates in parallel, then re-check and destroy them in ID order
fn clip_parallel(graph: &mut PreGraph, cutoff_length: usize) -> (usize, usize) {
    let mut clipped = 0;
    let mut rounds = 0;
    loop {
        rounds += 1;
        let candidates: Vec<usize> = {
            let shared: &PreGraph = graph;
            (1..=shared.node_count())
                .into_par_iter()
                .filter(|&index| is_tip_node(shared, index, cutoff_length))
                .collect()
        };
        let before = clipped;
        for index in candidates {
            // An earlier removal in this round may have changed the verdict
            if is_tip_node(graph, index, cutoff_length) {
                graph.destroy_node(NodeId::forward(index));
                clipped += 1;
            }
        }
        debug!("  round {}: {} tips", rounds, clipped - before);
        if clipped == before {
            return (clipped, rounds);
        }
    }
}

/// Clip tips shorter than `cutoff_length` k-mers, then contract the graph
///
/// With `parallel`, candidate detection and contraction run on the current
/// rayon thread pool.
pub fn clip_tips_with_cutoff(graph: &mut PreGraph, cutoff_length: usize, parallel: bool) -> ClipReport {
    info!("Clipping short tips off preGraph");
    debug!("  cutoff = {} k-mers", cutoff_length);

    let (clipped, rounds) = if parallel {
        clip_parallel(graph, cutoff_length)
    } else {
        clip_sequential(graph, cutoff_length)
    };
    info!("{} tips cut off", clipped);

    let concatenation = if parallel {
        concatenate_pregraph_parallel(graph)
    } else {
        concatenate_pregraph(graph)
    };
    info!("{} nodes left", concatenation.remaining);

    ClipReport {
        clipped,
        rounds,
        concatenation,
    }
}

/// Clip tips shorter than twice the word length, then contract the graph
pub fn clip_tips(graph: &mut PreGraph) -> ClipReport {
    let cutoff_length = DEFAULT_TIP_LENGTH_FACTOR * graph.word_length();
    clip_tips_with_cutoff(graph, cutoff_length, false)
}

/// Parallel variant of [`clip_tips`]
pub fn clip_tips_parallel(graph: &mut PreGraph) -> ClipReport {
    let cutoff_length = DEFAULT_TIP_LENGTH_FACTOR * graph.word_length();
    clip_tips_with_cutoff(graph, cutoff_length, true)
}
