//! Transition Meta-Graph
//!
//! Step 3.1: The Map of Trees
//!
//! Vertices are canonical tree identifiers plus two sentinels: Balanced
//! (terminal, the legacy `-1` label) and Split (the legacy `0` label).
//! Each engine invocation contributes exactly one directed edge. Trees that
//! had their flow evaluated carry a score attribute: the negative-flow sum,
//! zero exactly at a terminal tree.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use crate::cluster::TreeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaNode {
    Tree(TreeId),
    /// Terminal sentinel: the tree is balanced.
    Balanced,
    /// Split sentinel: rerouting cannot help, drop the most-negative edge.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A cycle-canceling step: tree -> strictly better tree.
    Improve,
    /// Tree -> Balanced sentinel.
    Terminal,
    /// Tree -> Split sentinel.
    Split,
}

/// Caller-owned map of every transition the engine produced.
pub struct MetaGraph {
    graph: DiGraph<MetaNode, TransitionKind>,
    index: HashMap<MetaNode, NodeIndex>,
    scores: HashMap<TreeId, i64>,
}

impl Default for MetaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            scores: HashMap::new(),
        }
    }

    fn node(&mut self, label: MetaNode) -> NodeIndex {
        if let Some(&ix) = self.index.get(&label) {
            return ix;
        }
        let ix = self.graph.add_node(label.clone());
        self.index.insert(label, ix);
        ix
    }

    /// Record one transition; re-recording an identical edge is a no-op so
    /// that re-invoking the engine on a settled tree mutates nothing.
    fn record(&mut self, from: MetaNode, to: MetaNode, kind: TransitionKind) {
        let (a, b) = (self.node(from), self.node(to));
        let exists = self
            .graph
            .edges_connecting(a, b)
            .any(|e| *e.weight() == kind);
        if !exists {
            self.graph.add_edge(a, b, kind);
        }
    }

    pub fn record_score(&mut self, id: TreeId, score: i64) {
        self.scores.insert(id, score);
    }

    pub fn score(&self, id: &TreeId) -> Option<i64> {
        self.scores.get(id).copied()
    }

    pub fn record_terminal(&mut self, id: TreeId) {
        self.record(MetaNode::Tree(id), MetaNode::Balanced, TransitionKind::Terminal);
    }

    pub fn record_split(&mut self, id: TreeId) {
        self.record(MetaNode::Tree(id), MetaNode::Split, TransitionKind::Split);
    }

    pub fn record_improve(&mut self, from: TreeId, to: TreeId) {
        self.record(MetaNode::Tree(from), MetaNode::Tree(to), TransitionKind::Improve);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The improving-transition subgraph, with the same node indices.
    fn improving(&self) -> DiGraph<(), ()> {
        let mut sub = DiGraph::with_capacity(self.graph.node_count(), 0);
        for _ in self.graph.node_indices() {
            sub.add_node(());
        }
        for edge in self.graph.edge_indices() {
            if self.graph[edge] == TransitionKind::Improve {
                let (a, b) = self.graph.edge_endpoints(edge).expect("edge exists");
                sub.add_edge(NodeIndex::new(a.index()), NodeIndex::new(b.index()), ());
            }
        }
        sub
    }

    /// The convergence hypothesis: restricted to cycle-canceling
    /// transitions, the meta-graph must be acyclic.
    pub fn improving_is_acyclic(&self) -> bool {
        toposort(&self.improving(), None).is_ok()
    }

    /// Longest chain of strictly improving transitions, in edges. Zero when
    /// the improving subgraph is cyclic (the hypothesis failed) or empty.
    pub fn longest_improving_chain(&self) -> usize {
        let sub = self.improving();
        let Ok(order) = toposort(&sub, None) else {
            return 0;
        };
        let mut longest = vec![0usize; sub.node_count()];
        let mut best = 0;
        for v in order {
            for w in sub.neighbors(v) {
                let via = longest[v.index()] + 1;
                if via > longest[w.index()] {
                    longest[w.index()] = via;
                    best = best.max(via);
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{diagnostic_cluster, SpanningTree};

    fn ids() -> (TreeId, TreeId, TreeId) {
        let g = diagnostic_cluster();
        (
            SpanningTree::new(&g, vec![3, 4, 5]).unwrap().id(),
            SpanningTree::new(&g, vec![1, 3, 4]).unwrap().id(),
            SpanningTree::new(&g, vec![0, 1, 3]).unwrap().id(),
        )
    }

    #[test]
    fn records_chain_and_sentinels() {
        let (a, b, c) = ids();
        let mut meta = MetaGraph::new();
        meta.record_score(a.clone(), -100);
        meta.record_improve(a.clone(), b.clone());
        meta.record_score(b.clone(), -6);
        meta.record_improve(b.clone(), c.clone());
        meta.record_score(c.clone(), 0);
        meta.record_terminal(c.clone());

        assert_eq!(meta.node_count(), 4); // three trees + Balanced sentinel
        assert_eq!(meta.edge_count(), 3);
        assert_eq!(meta.score(&a), Some(-100));
        assert_eq!(meta.score(&c), Some(0));
        assert!(meta.improving_is_acyclic());
        assert_eq!(meta.longest_improving_chain(), 2);
    }

    #[test]
    fn terminal_recording_is_idempotent() {
        let (a, _, _) = ids();
        let mut meta = MetaGraph::new();
        meta.record_terminal(a.clone());
        let edges = meta.edge_count();
        meta.record_terminal(a);
        assert_eq!(meta.edge_count(), edges);
    }

    #[test]
    fn improving_cycle_is_detected() {
        let (a, b, _) = ids();
        let mut meta = MetaGraph::new();
        meta.record_improve(a.clone(), b.clone());
        meta.record_improve(b, a);
        assert!(!meta.improving_is_acyclic());
        assert_eq!(meta.longest_improving_chain(), 0);
    }
}
