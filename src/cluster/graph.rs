//! Dependency Graph Construction
//!
//! Step 1.1: The Cluster Model
//!
//! A fixed DAG of transactions: nodes carry fee/weight attributes, directed
//! precedence edges `(u, v)` mean u must be included before/with v. Immutable
//! once constructed for the duration of one exploration run.

use eyre::{bail, Result};
use std::collections::HashSet;

/// A single transaction: integer-identified by its position in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxNode {
    pub fee: i64,
    pub weight: i64,
}

/// Directed precedence edge: `from` must be included before/with `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DepEdge {
    pub from: usize,
    pub to: usize,
}

impl DepEdge {
    /// The endpoint that is not `node`.
    pub fn other(&self, node: usize) -> usize {
        if node == self.from {
            self.to
        } else {
            self.from
        }
    }

}

/// The transaction dependency cluster.
///
/// Edges are held in a fixed sorted order; that enumeration is the canonical
/// order shared by every component downstream (tree identifiers, tie-breaks
/// on the most-negative edge).
pub struct DependencyGraph {
    nodes: Vec<TxNode>,
    edges: Vec<DepEdge>,
    total_fee: i64,
    total_weight: i64,
}

impl DependencyGraph {
    /// Build and validate a cluster.
    ///
    /// Rejects non-positive fees/weights, out-of-range or self-loop edges,
    /// duplicate edges, and any directed cycle.
    pub fn new(nodes: Vec<TxNode>, edges: Vec<(usize, usize)>) -> Result<Self> {
        if nodes.is_empty() {
            bail!("cluster must contain at least one transaction");
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.fee <= 0 || node.weight <= 0 {
                bail!(
                    "transaction {} has non-positive fee/weight ({}, {})",
                    i,
                    node.fee,
                    node.weight
                );
            }
        }

        let n = nodes.len();
        let mut seen = HashSet::new();
        let mut dep_edges = Vec::with_capacity(edges.len());
        for &(from, to) in &edges {
            if from >= n || to >= n {
                bail!("edge ({from}, {to}) references a transaction outside 0..{n}");
            }
            if from == to {
                bail!("edge ({from}, {to}) is a self-loop");
            }
            if !seen.insert((from, to)) {
                bail!("duplicate edge ({from}, {to})");
            }
            dep_edges.push(DepEdge { from, to });
        }

        // Canonical enumeration: sorted by (from, to).
        dep_edges.sort();

        Self::check_acyclic(n, &dep_edges)?;

        let total_fee = nodes.iter().map(|t| t.fee).sum();
        let total_weight = nodes.iter().map(|t| t.weight).sum();

        Ok(Self {
            nodes,
            edges: dep_edges,
            total_fee,
            total_weight,
        })
    }

    /// Kahn's algorithm; any leftover node means a directed cycle.
    fn check_acyclic(n: usize, edges: &[DepEdge]) -> Result<()> {
        let mut indegree = vec![0usize; n];
        let mut outgoing = vec![Vec::new(); n];
        for edge in edges {
            indegree[edge.to] += 1;
            outgoing[edge.from].push(edge.to);
        }

        let mut queue: Vec<usize> = (0..n).filter(|&v| indegree[v] == 0).collect();
        let mut processed = 0;
        while let Some(v) = queue.pop() {
            processed += 1;
            for &w in &outgoing[v] {
                indegree[w] -= 1;
                if indegree[w] == 0 {
                    queue.push(w);
                }
            }
        }

        if processed != n {
            bail!("dependency edges contain a directed cycle");
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, idx: usize) -> &TxNode {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &DepEdge {
        &self.edges[idx]
    }

    pub fn edges(&self) -> &[DepEdge] {
        &self.edges
    }

    pub fn total_fee(&self) -> i64 {
        self.total_fee
    }

    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    /// Fee/weight imbalance of `node` relative to the cluster-wide ratio.
    ///
    /// `excess(u) = fee(u) * total_weight - total_fee * weight(u)`.
    /// Positive means fee-rich. Summed over all nodes this is exactly zero,
    /// which is what makes flow derivation close at the root.
    pub fn excess(&self, node: usize) -> i64 {
        let tx = &self.nodes[node];
        tx.fee * self.total_weight - self.total_fee * tx.weight
    }
}

/// The fixed diagnostic cluster: 4 transactions, 6 edges. Shared by the
/// `inspect` binary and by tests across the crate.
pub fn diagnostic_cluster() -> DependencyGraph {
    let nodes = vec![
        TxNode { fee: 3, weight: 8 },
        TxNode { fee: 6, weight: 6 },
        TxNode { fee: 10, weight: 6 },
        TxNode { fee: 2, weight: 2 },
    ];
    let edges = vec![(1, 0), (2, 0), (2, 1), (3, 0), (3, 1), (3, 2)];
    DependencyGraph::new(nodes, edges).expect("diagnostic cluster is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excess_matches_hand_computation() {
        let g = diagnostic_cluster();
        assert_eq!(g.total_fee(), 21);
        assert_eq!(g.total_weight(), 22);
        assert_eq!(g.excess(0), -102);
        assert_eq!(g.excess(1), 6);
        assert_eq!(g.excess(2), 94);
        assert_eq!(g.excess(3), 2);
    }

    #[test]
    fn excess_sums_to_zero() {
        let g = diagnostic_cluster();
        let sum: i64 = (0..g.node_count()).map(|v| g.excess(v)).sum();
        assert_eq!(sum, 0);
    }

    #[test]
    fn edges_are_canonically_sorted() {
        let nodes = vec![TxNode { fee: 1, weight: 1 }; 3];
        let g = DependencyGraph::new(nodes, vec![(2, 1), (1, 0), (2, 0)]).unwrap();
        assert_eq!(g.edge(0), &DepEdge { from: 1, to: 0 });
        assert_eq!(g.edge(1), &DepEdge { from: 2, to: 0 });
        assert_eq!(g.edge(2), &DepEdge { from: 2, to: 1 });
    }

    #[test]
    fn rejects_directed_cycle() {
        let nodes = vec![TxNode { fee: 1, weight: 1 }; 3];
        let result = DependencyGraph::new(nodes, vec![(0, 1), (1, 2), (2, 0)]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_edge() {
        let nodes = vec![TxNode { fee: 1, weight: 1 }; 2];
        let result = DependencyGraph::new(nodes, vec![(1, 0), (1, 0)]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_positive_attributes() {
        let nodes = vec![TxNode { fee: 0, weight: 1 }];
        assert!(DependencyGraph::new(nodes, vec![]).is_err());
        let nodes = vec![TxNode { fee: 1, weight: -2 }];
        assert!(DependencyGraph::new(nodes, vec![]).is_err());
    }
}
