//! Cycle-Canceling Search
//!
//! Step 2.3: The Pathfinder
//!
//! A Dijkstra-style search over the augmented graph with a lexicographic
//! cost: minimize the count of freshly activated candidate arcs first, then
//! the worst residual capacity touched. This biases the search toward
//! reusing already-flowing structure over activating new edges, and among
//! fresh-edge routes toward the one with the smallest limiting capacity,
//! which keeps each rebalancing step structurally small.

use eyre::{bail, Result};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::trace;

use super::residual::{ArcKind, AugmentedGraph};

/// Composite path cost; derived `Ord` gives the lexicographic comparison
/// (fresh-edge count first, then worst capacity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathCost {
    pub fresh_edges: u32,
    pub worst_capacity: i64,
}

impl PathCost {
    pub const ZERO: PathCost = PathCost {
        fresh_edges: 0,
        worst_capacity: 0,
    };

    fn step(self, kind: ArcKind) -> PathCost {
        match kind {
            ArcKind::Candidate => PathCost {
                fresh_edges: self.fresh_edges + 1,
                worst_capacity: self.worst_capacity,
            },
            ArcKind::Residual { capacity } => PathCost {
                fresh_edges: self.fresh_edges,
                worst_capacity: self.worst_capacity.max(capacity),
            },
            ArcKind::Saturated => self,
        }
    }
}

/// The best arc path from source to dest, with the minimum usable residual
/// capacity along it (`None` when no bounded arc constrains the path).
pub struct BestPath {
    pub arcs: Vec<EdgeIndex>,
    pub bottleneck: Option<i64>,
}

/// Lowest-lexicographic-cost path from `source` to `dest` (cluster node
/// ids) through the augmented graph.
///
/// The caller has already established strong connectivity, so failing to
/// reach `dest` is a fatal invariant violation, not a recoverable miss.
pub fn best_path(aug: &AugmentedGraph, source: usize, dest: usize) -> Result<BestPath> {
    let start = aug.node_index(source);
    let goal = aug.node_index(dest);

    let mut dist: HashMap<NodeIndex, PathCost> = HashMap::new();
    let mut prev: HashMap<NodeIndex, EdgeIndex> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(start, PathCost::ZERO);
    heap.push(Reverse((PathCost::ZERO, start.index())));

    while let Some(Reverse((cost, v_ix))) = heap.pop() {
        let v = NodeIndex::new(v_ix);
        if dist.get(&v) != Some(&cost) {
            continue; // stale heap entry
        }
        if v == goal {
            break;
        }
        for arc_ref in aug.graph.edges(v) {
            let next_cost = cost.step(arc_ref.weight().kind);
            let w = arc_ref.target();
            if dist.get(&w).map_or(true, |&best| next_cost < best) {
                dist.insert(w, next_cost);
                prev.insert(w, arc_ref.id());
                heap.push(Reverse((next_cost, w.index())));
            }
        }
    }

    if !dist.contains_key(&goal) {
        bail!(
            "unreachable destination {dest} from {source} despite a single strongly connected component"
        );
    }

    // Reconstruct goal -> start, then flip.
    let mut arcs = Vec::new();
    let mut cursor = goal;
    while cursor != start {
        let arc = prev[&cursor];
        arcs.push(arc);
        let (arc_source, _) = aug
            .graph
            .edge_endpoints(arc)
            .expect("arc from predecessor map exists");
        cursor = arc_source;
    }
    arcs.reverse();

    let bottleneck = arcs
        .iter()
        .filter_map(|&a| match aug.arc(a).kind {
            ArcKind::Residual { capacity } => Some(capacity),
            _ => None,
        })
        .min();

    trace!(
        source,
        dest,
        arcs = arcs.len(),
        ?bottleneck,
        "best cancel path found"
    );
    Ok(BestPath { arcs, bottleneck })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::flow::derive;
    use crate::balance::residual::build_augmented;
    use crate::cluster::{diagnostic_cluster, SpanningTree};

    #[test]
    fn cost_ordering_is_lexicographic() {
        let cheap = PathCost {
            fresh_edges: 0,
            worst_capacity: 1_000,
        };
        let fresh = PathCost {
            fresh_edges: 1,
            worst_capacity: 0,
        };
        assert!(cheap < fresh);

        let tight = PathCost {
            fresh_edges: 1,
            worst_capacity: 5,
        };
        let loose = PathCost {
            fresh_edges: 1,
            worst_capacity: 50,
        };
        assert!(tight < loose);
    }

    #[test]
    fn star_tree_cancel_path() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![3, 4, 5]).unwrap();
        let flows = derive(&g, &tree).unwrap();
        let (aug, most_negative) = build_augmented(&g, &tree, &flows);
        assert_eq!(most_negative, Some(5));

        // Edge 5 is (3, 2): search from head 2 back to tail 3. The cheap
        // route activates candidate (2, 0) and pushes back through the
        // residual of (3, 0).
        let path = best_path(&aug, 2, 3).unwrap();
        assert_eq!(path.arcs.len(), 2);
        assert_eq!(aug.arc(path.arcs[0]).edge, 1);
        assert_eq!(aug.arc(path.arcs[0]).kind, ArcKind::Candidate);
        assert_eq!(aug.arc(path.arcs[1]).edge, 3);
        assert_eq!(
            aug.arc(path.arcs[1]).kind,
            ArcKind::Residual { capacity: 102 }
        );
        assert_eq!(path.bottleneck, Some(102));
    }
}
