//! Chain contraction
//!
//! Folds every maximal run of nodes joined end to end by singleton arcs into
//! the node the run starts from. An arc is a singleton link when it is the
//! only arc leaving its origin end and the only arc leaving its far end.
//!
//! For a run `A -> n1 -> ... -> B'` the fold:
//! 1. sums the run's lengths (the new length of `A`),
//! 2. moves the reference markers of every run node onto `A`,
//! 3. concatenates the descriptors, trimming the `k - 1` overlap at each seam,
//! 4. re-creates the arcs leaving `B'` on `A`,
//! 5. destroys `n1 ..= B'`.
//!
//! When `A` is a reverse strand the run is laid out from `-B'` to `-A` so the
//! new descriptor is always on the forward strand of `A`.
//!
//! Parallel contraction shares the graph behind a `parking_lot::RwLock`:
//! workers inspect under the read lock and fold under the write lock. A
//! worker first claims its node and the partner it wants to absorb in a
//! [`ClaimTable`]; every further node the walk reaches is claimed from
//! inside the fold, and a contended claim truncates the run. Claims never
//! wait, so contention only defers merges. Deferred merges are completed by
//! a sequential sweep once the workers have joined, before renumbering.

use crate::descriptor::DescriptorWriter;
use crate::node_id::NodeId;
use crate::pregraph::{ArcId, PreGraph};
use crate::simplify::claims::ClaimTable;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace};

/// Summary of one contraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcatenationReport {
    /// Nodes folded into a neighbour and destroyed
    pub absorbed: usize,
    /// Merges abandoned because another worker held one of the nodes
    pub deferred: usize,
    /// Live nodes after renumbering
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct FoldOutcome {
    absorbed: usize,
    contended: bool,
}

/// The singleton arc along which a fold can start from `end`, if any
fn foldable_arc(graph: &PreGraph, end: NodeId) -> Option<ArcId> {
    if !graph.contains(end) || !graph.has_single_arc(end) {
        return None;
    }
    let arc = graph.arc_head(end)?;
    (graph.has_single_arc(graph.other_end(arc, end)) && !graph.is_loop(arc)).then_some(arc)
}

/// Fold the singleton run that leaves `start` through `first_arc`
///
/// With `claims`, the caller must already hold `start` and the node behind
/// `first_arc`.
fn fold_chain(
    graph: &mut PreGraph,
    start: NodeId,
    first_arc: ArcId,
    claims: Option<&ClaimTable>,
) -> FoldOutcome {
    let word_length = graph.word_length();
    let first_partner = graph.destination(first_arc, start).index();
    let mut run = vec![start];
    let mut claimed = Vec::new();
    let mut contended = false;

    let mut current = start;
    let mut arc = Some(first_arc);
    while let Some(step) = arc {
        let next = graph.destination(step, current);
        if !graph.has_single_arc(current)
            || !graph.has_single_arc(graph.other_end(step, current))
            || graph.is_loop(step)
            || next == start
        {
            break;
        }
        if let Some(claims) = claims {
            let partner = next.index();
            if partner != first_partner {
                if claims.try_claim(partner) {
                    contended = true;
                    break;
                }
                claimed.push(partner);
            }
        }
        run.push(next);
        current = next;
        arc = graph.arc_head(current);
    }

    if run.len() < 2 {
        return FoldOutcome { absorbed: 0, contended };
    }
    let last = current;

    // Run as laid out along the forward strand of the surviving node
    let laid_out: Vec<NodeId> = if start.is_reverse() {
        run.iter().rev().map(|&id| -id).collect()
    } else {
        run.clone()
    };
    let total_length: usize = laid_out.iter().map(|&id| graph.node_length(id)).sum();

    if graph.markers_active() {
        let target = NodeId::forward(start.index());
        let mut placed = Vec::with_capacity(laid_out.len());
        let mut offset = 0;
        for &id in &laid_out {
            placed.push((id, offset));
            offset += graph.node_length(id);
        }
        // The survivor's own markers move before any others join its list
        placed.sort_by_key(|&(id, _)| id.index() != start.index());
        for (id, offset) in placed {
            graph.fold_markers(target, id, offset);
        }
    }

    let mut writer = DescriptorWriter::new(total_length + word_length - 1, word_length);
    for (i, &id) in laid_out.iter().enumerate() {
        writer.append(graph.descriptor(id), id.is_reverse(), i == 0);
    }
    graph.set_descriptor(start, writer.finish());

    let outgoing: Vec<ArcId> = graph.arcs(last).collect();
    for arc in outgoing {
        let destination = graph.destination(arc, last);
        // A hairpin on the last node becomes a hairpin on the survivor
        let destination = if destination == -last { -start } else { destination };
        graph.create_analogous_arc(start, destination, arc);
    }

    for &id in &run[1..] {
        graph.destroy_node(id);
    }
    if let Some(claims) = claims {
        for partner in claimed {
            claims.release(partner);
        }
    }

    trace!("Folded {} nodes into {} (length {})", run.len() - 1, start, total_length);
    FoldOutcome {
        absorbed: run.len() - 1,
        contended,
    }
}

/// One sequential pass over all node IDs, both strands
fn sweep(graph: &mut PreGraph) -> usize {
    let mut absorbed = 0;
    for index in 1..=graph.node_count() {
        for end in [NodeId::forward(index), NodeId::reverse(index)] {
            while let Some(arc) = foldable_arc(graph, end) {
                let outcome = fold_chain(graph, end, arc, None);
                if outcome.absorbed == 0 {
                    break;
                }
                absorbed += outcome.absorbed;
            }
        }
    }
    absorbed
}

/// Contract every singleton chain of the graph, then renumber it
///
/// Runs on the calling thread without any locking.
pub fn concatenate_pregraph(graph: &mut PreGraph) -> ConcatenationReport {
    info!("Concatenation...");
    let absorbed = sweep(graph);
    graph.renumber();
    info!("Concatenation over!");

    let report = ConcatenationReport {
        absorbed,
        deferred: 0,
        remaining: graph.live_node_count(),
    };
    debug!("  absorbed {} nodes, {} left", report.absorbed, report.remaining);
    report
}

/// Fold from `end` until it has no singleton chain left, sharing the graph
/// with other workers
fn fold_shared(
    shared: &RwLock<&mut PreGraph>,
    claims: &ClaimTable,
    end: NodeId,
    absorbed: &AtomicUsize,
    deferred: &AtomicUsize,
) {
    loop {
        let partner = {
            let graph = shared.read();
            match foldable_arc(&graph, end) {
                Some(arc) => graph.destination(arc, end).index(),
                None => return,
            }
        };

        let Some(pair) = claims.claim_pair(end.index(), partner) else {
            deferred.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut graph = shared.write();
        let outcome = match foldable_arc(&graph, end) {
            Some(arc) if graph.destination(arc, end).index() == partner => {
                fold_chain(&mut graph, end, arc, Some(claims))
            }
            // Another worker rewired this end between the two locks
            Some(_) => continue,
            None => return,
        };
        drop(pair);
        drop(graph);

        if outcome.contended {
            deferred.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.absorbed == 0 {
            return;
        }
        absorbed.fetch_add(outcome.absorbed, Ordering::Relaxed);
    }
}

/// Contract every singleton chain using the current rayon thread pool, then
/// renumber the graph
///
/// Node IDs are split across workers. Merges that lose a claim race are
/// finished by a sequential sweep after the parallel one, so the result
/// matches [`concatenate_pregraph`] up to node numbering.
pub fn concatenate_pregraph_parallel(graph: &mut PreGraph) -> ConcatenationReport {
    info!("Concatenation...");
    let node_count = graph.node_count();
    let claims = ClaimTable::new(node_count + 1);
    let absorbed = AtomicUsize::new(0);
    let deferred = AtomicUsize::new(0);

    {
        let shared = RwLock::new(&mut *graph);
        (1..=node_count).into_par_iter().for_each(|index| {
            for end in [NodeId::forward(index), NodeId::reverse(index)] {
                fold_shared(&shared, &claims, end, &absorbed, &deferred);
            }
        });
    }

    let mut absorbed = absorbed.into_inner();
    let deferred = deferred.into_inner();
    if deferred > 0 {
        debug!("  {} merges deferred by contention, completing sequentially", deferred);
        absorbed += sweep(graph);
    }

    graph.renumber();
    info!("Concatenation over!");

    let report = ConcatenationReport {
        absorbed,
        deferred,
        remaining: graph.live_node_count(),
    };
    debug!("  absorbed {} nodes, {} left", report.absorbed, report.remaining);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::reverse_complement;
    use crate::markers::ReferenceMarker;

    const K: usize = 5;

    /// Split `contig` into `n` nodes of `node_length` k-mers, flipping the
    /// nodes listed in `flipped`, and link them in order
    fn chain(graph: &mut PreGraph, contig: &str, node_length: usize, flipped: &[usize]) -> Vec<NodeId> {
        let k = graph.word_length();
        let n = (contig.len() - k + 1) / node_length;
        let ids: Vec<NodeId> = (0..n)
            .map(|i| {
                let piece = &contig[i * node_length..i * node_length + node_length + k - 1];
                if flipped.contains(&i) {
                    -graph.add_node(reverse_complement(piece).as_bytes()).unwrap()
                } else {
                    graph.add_node(piece.as_bytes()).unwrap()
                }
            })
            .collect();
        for pair in ids.windows(2) {
            graph.add_arc(pair[0], pair[1], 4).unwrap();
        }
        ids
    }

    const CONTIG: &str = "ACGTTGCAAGCTTAGGCATCGATCCGA"; // 27 symbols, 23 5-mers

    #[test]
    fn test_straight_chain_folds_to_one_node() {
        let mut graph = PreGraph::new(K, false).unwrap();
        // 23 k-mers do not split evenly into 4-mers: use the first 20 + 4 symbols
        let contig = &CONTIG[..24];
        chain(&mut graph, contig, 4, &[]);
        assert_eq!(graph.live_node_count(), 5);

        let report = concatenate_pregraph(&mut graph);
        assert_eq!(report.absorbed, 4);
        assert_eq!(report.remaining, 1);
        let id = NodeId::forward(1);
        assert_eq!(graph.node_length(id), 20);
        assert_eq!(graph.descriptor(id).len(), 24);
        assert_eq!(graph.sequence(id), contig);
        assert_eq!(graph.arc_total(), 0);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_mixed_strands_fold_correctly() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..24];
        chain(&mut graph, contig, 4, &[0, 2, 3]);

        concatenate_pregraph(&mut graph);
        assert_eq!(graph.live_node_count(), 1);
        let sequence = graph.sequence(NodeId::forward(1));
        assert!(sequence == contig || sequence == reverse_complement(contig));
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_outer_arcs_move_to_survivor() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..24];
        let ids = chain(&mut graph, contig, 4, &[]);
        // Branches on both sides keep the chain from reaching the outside
        let left_a = graph.add_node(b"GGGGGACGT").unwrap();
        let left_b = graph.add_node(b"CCCCCACGT").unwrap();
        let right_a = graph.add_node(b"CCGATTTTT").unwrap();
        let right_b = graph.add_node(b"CCGAGGGGG").unwrap();
        graph.add_arc(left_a, ids[0], 2).unwrap();
        graph.add_arc(left_b, ids[0], 3).unwrap();
        graph.add_arc(ids[4], right_a, 5).unwrap();
        graph.add_arc(ids[4], -right_b, 6).unwrap();

        let report = concatenate_pregraph(&mut graph);
        assert_eq!(report.absorbed, 4);
        assert_eq!(report.remaining, 5);

        // Survivor keeps index 1 after renumbering
        let survivor = NodeId::forward(1);
        assert_eq!(graph.sequence(survivor), contig);
        let mut outgoing: Vec<u32> = graph.arcs(survivor).map(|arc| graph.multiplicity(arc)).collect();
        outgoing.sort_unstable();
        assert_eq!(outgoing, vec![5, 6]);
        assert_eq!(graph.arc_count(-survivor), 2);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_hairpin_on_last_node_moves_to_survivor() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..12]; // two nodes of 4 k-mers
        let ids = chain(&mut graph, contig, 4, &[]);
        graph.add_arc(ids[1], -ids[1], 1).unwrap();

        concatenate_pregraph(&mut graph);
        assert_eq!(graph.live_node_count(), 1);
        let survivor = NodeId::forward(1);
        let arc = graph.arc_head(survivor).unwrap();
        assert_eq!(graph.destination(arc, survivor), -survivor);
        assert!(graph.is_loop(arc));
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_cycle_closes_into_self_loop() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..20]; // four nodes of 4 k-mers
        let ids = chain(&mut graph, contig, 4, &[1]);
        graph.add_arc(ids[3], ids[0], 2).unwrap();

        let report = concatenate_pregraph(&mut graph);
        assert_eq!(report.absorbed, 3);
        assert_eq!(graph.live_node_count(), 1);
        let survivor = NodeId::forward(1);
        assert_eq!(graph.node_length(survivor), 16);
        let arc = graph.arc_head(survivor).unwrap();
        assert!(graph.is_loop(arc));
        assert_eq!(graph.destination(arc, survivor), survivor);

        // A second pass leaves the loop alone
        let again = concatenate_pregraph(&mut graph);
        assert_eq!(again.absorbed, 0);
        assert_eq!(graph.live_node_count(), 1);
    }

    #[test]
    fn test_self_loop_is_never_merged() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let a = graph.add_node(b"ACGTACGT").unwrap();
        graph.add_arc(a, a, 1).unwrap();
        let b = graph.add_node(b"TTGCATTG").unwrap();
        graph.add_arc(b, -b, 1).unwrap();

        let report = concatenate_pregraph(&mut graph);
        assert_eq!(report.absorbed, 0);
        assert_eq!(graph.live_node_count(), 2);
        assert_eq!(graph.sequence(NodeId::forward(1)), "ACGTACGT");
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_branch_blocks_contraction() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let a = graph.add_node(b"ACGTACGT").unwrap();
        let b = graph.add_node(b"TACGGGGG").unwrap();
        let c = graph.add_node(b"TACGCCCC").unwrap();
        graph.add_arc(a, b, 1).unwrap();
        graph.add_arc(a, c, 1).unwrap();

        let report = concatenate_pregraph(&mut graph);
        assert_eq!(report.absorbed, 0);
        assert_eq!(report.remaining, 3);
    }

    #[test]
    fn test_markers_follow_their_sequence() {
        let mut graph = PreGraph::new(K, true).unwrap();
        let contig = &CONTIG[..24];
        let ids = chain(&mut graph, contig, 4, &[1, 4]);
        for (i, &id) in ids.iter().enumerate() {
            graph
                .add_marker(id, ReferenceMarker::new(0, (i * 4 + 1) as u64, 1, 2))
                .unwrap();
        }

        concatenate_pregraph(&mut graph);
        let survivor = NodeId::forward(1);
        let sequence = graph.sequence(survivor);
        let markers = graph.markers(survivor);
        assert_eq!(markers.len(), 5);
        for marker in markers {
            let span = &sequence[marker.node_offset..marker.node_offset + marker.length + K - 1];
            let span = if marker.reverse {
                reverse_complement(span)
            } else {
                span.to_string()
            };
            let start = marker.reference_start as usize;
            assert_eq!(span, &contig[start..start + marker.length + K - 1]);
        }
    }

    #[test]
    fn test_reverse_start_lays_out_forward() {
        let mut graph = PreGraph::new(K, true).unwrap();
        let a = graph.add_node(b"ACGTACGT").unwrap();
        let b = graph.add_node(b"GGGGACGT").unwrap();
        // b -> a, so folding starts from -a and walks to -b
        graph.add_arc(b, a, 1).unwrap();
        graph.add_marker(a, ReferenceMarker::new(7, 0, 0, 4)).unwrap();
        graph.add_marker(b, ReferenceMarker::new(7, 100, 1, 2)).unwrap();

        let arc = graph.arc_head(-a).unwrap();
        let outcome = fold_chain(&mut graph, -a, arc, None);
        assert_eq!(outcome.absorbed, 1);
        assert!(!graph.contains(b));
        assert_eq!(graph.sequence(a), "GGGGACGTACGT");
        assert_eq!(graph.node_length(a), 8);

        let mut markers = graph.markers(a).to_vec();
        markers.sort_by_key(|m| m.reference_start);
        // a's own k-mers now sit after b's four, b's marker stays put
        assert_eq!(markers[0].node_offset, 4);
        assert_eq!(markers[1].node_offset, 1);
        assert!(markers.iter().all(|m| !m.reverse));
    }

    #[test]
    fn test_contended_claim_truncates_run() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..24];
        let ids = chain(&mut graph, contig, 4, &[]);
        let claims = ClaimTable::new(ids.len() + 1);
        // Another worker holds node 4
        assert!(!claims.try_claim(4));

        let pair = claims.claim_pair(1, 2).unwrap();
        let arc = graph.arc_head(ids[0]).unwrap();
        let outcome = fold_chain(&mut graph, ids[0], arc, Some(&claims));
        assert_eq!(outcome.absorbed, 2);
        assert!(outcome.contended);
        assert!(!claims.is_claimed(3));
        assert!(claims.is_claimed(4));
        drop(pair);
        assert!(!claims.is_claimed(1));
        assert!(!claims.is_claimed(2));

        assert_eq!(graph.live_node_count(), 3);
        assert_eq!(graph.node_length(ids[0]), 12);
        assert_eq!(graph.sequence(ids[0]), &contig[..16]);
        assert_eq!(graph.destination(graph.arc_head(ids[0]).unwrap(), ids[0]), ids[3]);
        graph.check_integrity().unwrap();

        // The completion sweep finishes what contention left behind
        assert_eq!(sweep(&mut graph), 2);
        graph.renumber();
        assert_eq!(graph.live_node_count(), 1);
        assert_eq!(graph.sequence(NodeId::forward(1)), contig);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_claimed_partner_defers_merge() {
        let mut graph = PreGraph::new(K, false).unwrap();
        let contig = &CONTIG[..24];
        let ids = chain(&mut graph, contig, 4, &[]);
        let claims = ClaimTable::new(ids.len() + 1);
        let absorbed = AtomicUsize::new(0);
        let deferred = AtomicUsize::new(0);
        assert!(!claims.try_claim(2));

        {
            let shared = RwLock::new(&mut graph);
            fold_shared(&shared, &claims, ids[0], &absorbed, &deferred);
            assert_eq!(deferred.load(Ordering::Relaxed), 1);
            assert_eq!(absorbed.load(Ordering::Relaxed), 0);
            assert!(!claims.is_claimed(1));
            assert_eq!(shared.read().live_node_count(), 5);

            // Once the partner is free the whole chain folds
            claims.release(2);
            fold_shared(&shared, &claims, ids[0], &absorbed, &deferred);
        }
        assert_eq!(deferred.load(Ordering::Relaxed), 1);
        assert_eq!(absorbed.load(Ordering::Relaxed), 4);
        assert!(!claims.is_claimed(1));
        assert!(!claims.is_claimed(2));
        assert_eq!(graph.live_node_count(), 1);
        assert_eq!(graph.sequence(ids[0]), contig);
        graph.check_integrity().unwrap();
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let build = || {
            let mut graph = PreGraph::new(K, false).unwrap();
            for (round, flipped) in [&[][..], &[0, 3], &[1, 2, 4]].iter().enumerate() {
                let rotated = format!("{}{}", &CONTIG[round..], &CONTIG[..round]);
                chain(&mut graph, &rotated[..24], 4, flipped);
            }
            graph
        };

        let mut sequential = build();
        let mut parallel = build();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let seq_report = concatenate_pregraph(&mut sequential);
        let par_report = pool.install(|| concatenate_pregraph_parallel(&mut parallel));

        assert_eq!(seq_report.remaining, 3);
        assert_eq!(par_report.remaining, 3);
        assert_eq!(par_report.absorbed, seq_report.absorbed);
        parallel.check_integrity().unwrap();

        let canonical = |graph: &PreGraph| {
            let mut contigs: Vec<String> = graph
                .node_ids()
                .map(|id| {
                    let forward = graph.sequence(id);
                    let reverse = reverse_complement(&forward);
                    forward.min(reverse)
                })
                .collect();
            contigs.sort();
            contigs
        };
        assert_eq!(canonical(&sequential), canonical(&parallel));
    }
}
