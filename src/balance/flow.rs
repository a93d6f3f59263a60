//! Flow Derivation
//!
//! Step 2.1: Excess Propagation
//!
//! Treat the spanning tree as rooted at node 0 and propagate each subtree's
//! accumulated excess onto its parent edge. Flow sign follows the edge's
//! dependency direction: positive flow on (u, v) moves value u -> v, and for
//! every node `outgoing - incoming = excess(node)` (flow conservation).
//!
//! The leftover at the root must be exactly zero because node excess sums to
//! zero across the cluster; any other value is a programming-error signal and
//! aborts the run.

use eyre::{bail, Result};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;
use tracing::trace;

use crate::cluster::{DependencyGraph, SpanningTree};

/// Signed integer flow per flow-bearing edge (tree edges, plus candidate
/// edges activated mid-update).
#[derive(Debug, Clone, Default)]
pub struct FlowAssignment {
    flows: HashMap<usize, i64>,
}

impl FlowAssignment {
    pub fn get(&self, edge_idx: usize) -> i64 {
        self.flows.get(&edge_idx).copied().unwrap_or(0)
    }

    pub fn set(&mut self, edge_idx: usize, flow: i64) {
        self.flows.insert(edge_idx, flow);
    }

    pub fn remove(&mut self, edge_idx: usize) {
        self.flows.remove(&edge_idx);
    }

    pub fn carries(&self, edge_idx: usize) -> bool {
        self.flows.contains_key(&edge_idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.flows.iter().map(|(&e, &f)| (e, f))
    }

    pub fn has_negative(&self) -> bool {
        self.flows.values().any(|&f| f < 0)
    }

    /// The tree's score: the sum of all negative flow values. Zero exactly
    /// at a balanced (terminal) tree.
    pub fn negative_sum(&self) -> i64 {
        self.flows.values().filter(|&&f| f < 0).sum()
    }
}

/// Derive the flow assignment of `tree` by bottom-up excess propagation.
///
/// Errors on a malformed (cyclic or disconnected) edge set and on a nonzero
/// root leftover, both fatal to the trial.
pub fn derive(graph: &DependencyGraph, tree: &SpanningTree) -> Result<FlowAssignment> {
    let n = graph.node_count();
    let adj = tree.adjacency(graph);

    // Parent-guarded iterative DFS from node 0, recording visit order so the
    // excess accumulation below can run in reverse (children before parents).
    let mut parent_edge: Vec<Option<usize>> = vec![None; n];
    let mut order = Vec::with_capacity(n);
    let mut visited = FixedBitSet::with_capacity(n);
    visited.insert(0);

    let mut stack = vec![0usize];
    while let Some(v) = stack.pop() {
        order.push(v);
        for &idx in &adj[v] {
            if parent_edge[v] == Some(idx) {
                continue;
            }
            let w = graph.edge(idx).other(v);
            if visited.contains(w) {
                bail!("malformed tree: undirected cycle through edge {idx}");
            }
            visited.insert(w);
            parent_edge[w] = Some(idx);
            stack.push(w);
        }
    }
    if order.len() != n {
        bail!(
            "malformed tree: {} of {} transactions unreachable from the root",
            n - order.len(),
            n
        );
    }

    let mut acc: Vec<i64> = (0..n).map(|v| graph.excess(v)).collect();
    let mut flows = FlowAssignment::default();

    for &v in order.iter().rev() {
        let Some(idx) = parent_edge[v] else {
            continue; // root
        };
        let edge = graph.edge(idx);
        let parent = edge.other(v);
        // Net excess of v's subtree leaves toward the parent. If the edge's
        // dependency direction points out of the subtree the flow is the
        // accumulated excess itself, otherwise its negation.
        let flow = if edge.from == v { acc[v] } else { -acc[v] };
        flows.set(idx, flow);
        trace!(edge = idx, flow, "derived tree edge flow");
        acc[parent] += acc[v];
    }

    if acc[0] != 0 {
        bail!(
            "flow conservation violated: root leftover {} (excess must sum to zero); flows: {:?}",
            acc[0],
            flows.flows
        );
    }

    Ok(flows)
}

/// Test/diagnostic helper: per-node conservation residual
/// `outgoing - incoming - excess`, which must be zero everywhere.
pub fn conservation_residual(
    graph: &DependencyGraph,
    flows: &FlowAssignment,
    node: usize,
) -> i64 {
    let mut net_out = 0;
    for (idx, flow) in flows.iter() {
        let edge = graph.edge(idx);
        if edge.from == node {
            net_out += flow;
        } else if edge.to == node {
            net_out -= flow;
        }
    }
    net_out - graph.excess(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{diagnostic_cluster, random_spanning_tree};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn chain_tree_flows_are_positive_and_conserve() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        let flows = derive(&g, &tree).unwrap();

        assert_eq!(flows.get(0), 102);
        assert_eq!(flows.get(2), 96);
        assert_eq!(flows.get(5), 2);
        assert!(!flows.has_negative());
        assert_eq!(flows.negative_sum(), 0);

        for v in 0..g.node_count() {
            assert_eq!(conservation_residual(&g, &flows, v), 0, "node {v}");
        }
    }

    #[test]
    fn star_tree_carries_negative_flow() {
        let g = diagnostic_cluster();
        // Star at node 3: edges (3,0), (3,1), (3,2) = indices 3, 4, 5.
        let tree = SpanningTree::new(&g, vec![3, 4, 5]).unwrap();
        let flows = derive(&g, &tree).unwrap();

        assert_eq!(flows.get(3), 102);
        assert_eq!(flows.get(4), -6);
        assert_eq!(flows.get(5), -94);
        assert!(flows.has_negative());
        assert_eq!(flows.negative_sum(), -100);

        for v in 0..g.node_count() {
            assert_eq!(conservation_residual(&g, &flows, v), 0, "node {v}");
        }
    }

    #[test]
    fn conservation_holds_on_random_trees() {
        let g = diagnostic_cluster();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = random_spanning_tree(&g, &mut rng).unwrap();
            let flows = derive(&g, &tree).unwrap();
            for v in 0..g.node_count() {
                assert_eq!(conservation_residual(&g, &flows, v), 0);
            }
        }
    }
}
