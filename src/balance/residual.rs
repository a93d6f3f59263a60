//! Augmented Graph Construction
//!
//! Step 2.2: Saturation and Residual Capacity
//!
//! From the flow-bearing tree, build a directed graph exposing three arc
//! kinds per the saturation/activity marker:
//! - Saturated: a tree edge in its dependency direction (already flowing,
//!   reuse is free)
//! - Residual: the reverse of a positive-flow tree edge, bounded by that flow
//! - Candidate: a non-tree cluster edge, flow zero, unlimited but not yet
//!   activated
//!
//! Strong connectivity of this graph decides whether rerouting can help at
//! all; more than one SCC means the tree must be split instead.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};

use crate::cluster::{DependencyGraph, SpanningTree};

use super::flow::FlowAssignment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    /// Tree edge in dependency direction; no forward capacity bound tracked.
    Saturated,
    /// Reverse of a positive-flow tree edge; consuming it pushes flow back.
    Residual { capacity: i64 },
    /// Non-tree cluster edge, not yet activated.
    Candidate,
}

/// One directed arc of the augmented graph, tagged with the cluster edge it
/// was derived from.
#[derive(Debug, Clone, Copy)]
pub struct Arc {
    pub edge: usize,
    pub kind: ArcKind,
}

/// The augmented directed graph over the cluster's node set.
pub struct AugmentedGraph {
    pub graph: DiGraph<usize, Arc>,
    /// Cluster node id -> petgraph index (inserted in id order).
    index: Vec<NodeIndex>,
}

impl AugmentedGraph {
    pub fn node_index(&self, node: usize) -> NodeIndex {
        self.index[node]
    }

    pub fn arc(&self, arc: EdgeIndex) -> &Arc {
        &self.graph[arc]
    }

    /// Strongly connected components, as cluster node id groups.
    pub fn components(&self) -> Vec<Vec<usize>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|comp| comp.into_iter().map(|ix| self.graph[ix]).collect())
            .collect()
    }

    pub fn is_single_component(&self) -> bool {
        tarjan_scc(&self.graph).len() == 1
    }
}

/// Build the augmented graph and locate the tree edge with the most negative
/// flow (first in canonical edge order on ties).
pub fn build_augmented(
    graph: &DependencyGraph,
    tree: &SpanningTree,
    flows: &FlowAssignment,
) -> (AugmentedGraph, Option<usize>) {
    let mut aug = DiGraph::with_capacity(graph.node_count(), graph.edge_count() * 2);
    let index: Vec<NodeIndex> = (0..graph.node_count()).map(|v| aug.add_node(v)).collect();

    let mut most_negative: Option<(usize, i64)> = None;

    for (idx, edge) in graph.edges().iter().enumerate() {
        let (from, to) = (index[edge.from], index[edge.to]);
        if tree.contains(idx) {
            let flow = flows.get(idx);
            aug.add_edge(
                from,
                to,
                Arc {
                    edge: idx,
                    kind: ArcKind::Saturated,
                },
            );
            if flow > 0 {
                aug.add_edge(
                    to,
                    from,
                    Arc {
                        edge: idx,
                        kind: ArcKind::Residual { capacity: flow },
                    },
                );
            }
            if flow < 0 && most_negative.map_or(true, |(_, best)| flow < best) {
                most_negative = Some((idx, flow));
            }
        } else {
            aug.add_edge(
                from,
                to,
                Arc {
                    edge: idx,
                    kind: ArcKind::Candidate,
                },
            );
        }
    }

    (
        AugmentedGraph { graph: aug, index },
        most_negative.map(|(idx, _)| idx),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::flow::derive;
    use crate::cluster::{diagnostic_cluster, DependencyGraph, SpanningTree, TxNode};

    #[test]
    fn star_tree_augmentation() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![3, 4, 5]).unwrap();
        let flows = derive(&g, &tree).unwrap();
        let (aug, most_negative) = build_augmented(&g, &tree, &flows);

        // 3 candidates + 3 saturated tree arcs + 1 residual (only edge 3 has
        // positive flow).
        assert_eq!(aug.graph.edge_count(), 7);
        assert_eq!(most_negative, Some(5));
        assert!(aug.is_single_component());

        let residuals: Vec<_> = aug
            .graph
            .edge_indices()
            .filter(|&e| matches!(aug.arc(e).kind, ArcKind::Residual { .. }))
            .collect();
        assert_eq!(residuals.len(), 1);
        assert_eq!(aug.arc(residuals[0]).edge, 3);
        assert_eq!(
            aug.arc(residuals[0]).kind,
            ArcKind::Residual { capacity: 102 }
        );
    }

    #[test]
    fn balanced_tree_has_no_most_negative_edge() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        let flows = derive(&g, &tree).unwrap();
        let (_, most_negative) = build_augmented(&g, &tree, &flows);
        assert_eq!(most_negative, None);
    }

    #[test]
    fn negative_only_pair_splits_into_two_components() {
        // Two transactions, one edge, fee-poor child: the lone tree edge
        // carries negative flow, no residual arc exists, and the augmented
        // graph falls apart into two SCCs.
        let g = DependencyGraph::new(
            vec![TxNode { fee: 2, weight: 1 }, TxNode { fee: 1, weight: 2 }],
            vec![(1, 0)],
        )
        .unwrap();
        let tree = SpanningTree::new(&g, vec![0]).unwrap();
        let flows = derive(&g, &tree).unwrap();
        assert_eq!(flows.get(0), -3);

        let (aug, most_negative) = build_augmented(&g, &tree, &flows);
        assert_eq!(most_negative, Some(0));
        assert!(!aug.is_single_component());
        assert_eq!(aug.components().len(), 2);
    }
}
