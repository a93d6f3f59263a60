//! Spanning Trees and Canonical Identifiers
//!
//! Step 1.2: The Tree Supply
//!
//! A spanning tree is an undirected edge subset of the cluster (direction
//! ignored) connecting every transaction with exactly `|nodes|-1` edges and
//! no cycle. Its canonical identifier is an explicit bit-set over the
//! cluster's fixed edge enumeration; that identifier is the vertex label in
//! the exploration meta-graph.

use eyre::{bail, Result};
use fixedbitset::FixedBitSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fmt;

use super::graph::DependencyGraph;

/// Canonical tree identifier: bit i set ⇔ cluster edge i belongs to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeId(FixedBitSet);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.0.len() {
            write!(f, "{}", if self.0.contains(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

/// One step along a tree path: the edge index and whether the traversal
/// direction agrees with the edge's dependency direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub edge: usize,
    pub forward: bool,
}

/// A validated spanning tree over the cluster's node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    /// Sorted edge indices into the cluster's canonical edge list.
    edges: Vec<usize>,
    /// Same set as a bit-set, for O(1) membership.
    member: FixedBitSet,
}

impl SpanningTree {
    /// Build a spanning tree from edge indices, validating the tree
    /// invariant: `|nodes|-1` edges, no cycle, every node reachable.
    pub fn new(graph: &DependencyGraph, mut edges: Vec<usize>) -> Result<Self> {
        let n = graph.node_count();
        edges.sort_unstable();
        edges.dedup();

        if edges.len() != n.saturating_sub(1) {
            bail!(
                "spanning tree needs {} edges, got {}",
                n.saturating_sub(1),
                edges.len()
            );
        }

        let mut uf = UnionFind::new(n);
        for &idx in &edges {
            if idx >= graph.edge_count() {
                bail!("edge index {idx} outside cluster edge list");
            }
            let edge = graph.edge(idx);
            if !uf.union(edge.from, edge.to) {
                bail!("edge set contains an undirected cycle through edge {idx}");
            }
        }
        // n-1 successful unions on n nodes leaves a single component, so
        // connectivity needs no separate check.

        let mut member = FixedBitSet::with_capacity(graph.edge_count());
        for &idx in &edges {
            member.insert(idx);
        }

        Ok(Self { edges, member })
    }

    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    pub fn contains(&self, edge_idx: usize) -> bool {
        self.member.contains(edge_idx)
    }

    /// Canonical identifier over the cluster's edge enumeration.
    pub fn id(&self) -> TreeId {
        TreeId(self.member.clone())
    }

    /// Tree-only incident edge lists per node.
    pub fn adjacency(&self, graph: &DependencyGraph) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); graph.node_count()];
        for &idx in &self.edges {
            let edge = graph.edge(idx);
            adj[edge.from].push(idx);
            adj[edge.to].push(idx);
        }
        adj
    }

    /// The unique undirected tree path from `from` to `to`.
    ///
    /// Iterative traversal with a parent guard: a malformed edge set (cycle
    /// or disconnection) is detected and reported rather than recursing
    /// forever.
    pub fn path_between(
        &self,
        graph: &DependencyGraph,
        from: usize,
        to: usize,
    ) -> Result<Vec<PathStep>> {
        let n = graph.node_count();
        let adj = self.adjacency(graph);

        let mut parent: Vec<Option<(usize, usize)>> = vec![None; n]; // (node, edge)
        let mut visited = FixedBitSet::with_capacity(n);
        visited.insert(from);

        let mut stack = vec![from];
        while let Some(v) = stack.pop() {
            for &idx in &adj[v] {
                let w = graph.edge(idx).other(v);
                if let Some((_, parent_edge)) = parent[v] {
                    if parent_edge == idx {
                        continue;
                    }
                }
                if visited.contains(w) {
                    bail!("malformed tree: undirected cycle through edge {idx}");
                }
                visited.insert(w);
                parent[w] = Some((v, idx));
                stack.push(w);
            }
        }

        if !visited.contains(to) {
            bail!("malformed tree: no path from {from} to {to}");
        }

        // Walk back from `to`, then flip into from -> to order.
        let mut steps = Vec::new();
        let mut cursor = to;
        while cursor != from {
            let (prev, idx) = parent[cursor].expect("visited nodes have parents");
            let edge = graph.edge(idx);
            steps.push(PathStep {
                edge: idx,
                forward: edge.from == prev && edge.to == cursor,
            });
            cursor = prev;
        }
        steps.reverse();
        Ok(steps)
    }
}

/// Sample a uniformly shuffled spanning tree: randomized Kruskal over the
/// cluster's edge list.
pub fn random_spanning_tree(graph: &DependencyGraph, rng: &mut StdRng) -> Result<SpanningTree> {
    let mut order: Vec<usize> = (0..graph.edge_count()).collect();
    order.shuffle(rng);

    let n = graph.node_count();
    let mut uf = UnionFind::new(n);
    let mut picked = Vec::with_capacity(n.saturating_sub(1));
    for idx in order {
        let edge = graph.edge(idx);
        if uf.union(edge.from, edge.to) {
            picked.push(idx);
            if picked.len() == n - 1 {
                break;
            }
        }
    }

    if picked.len() != n.saturating_sub(1) {
        bail!("cluster is not connected; cannot sample a spanning tree");
    }
    SpanningTree::new(graph, picked)
}

/// Union-find with path halving and union by size.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, mut v: usize) -> usize {
        while self.parent[v] != v {
            self.parent[v] = self.parent[self.parent[v]];
            v = self.parent[v];
        }
        v
    }

    /// Returns false if `a` and `b` were already in the same component.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::diagnostic_cluster;
    use rand::SeedableRng;

    #[test]
    fn accepts_chain_tree() {
        let g = diagnostic_cluster();
        // Edges (1,0), (2,1), (3,2) are canonical indices 0, 2, 5.
        let tree = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        assert_eq!(tree.edges(), &[0, 2, 5]);
        assert!(tree.contains(2));
        assert!(!tree.contains(1));
    }

    #[test]
    fn rejects_wrong_edge_count() {
        let g = diagnostic_cluster();
        assert!(SpanningTree::new(&g, vec![0, 2]).is_err());
    }

    #[test]
    fn rejects_cyclic_edge_set() {
        let g = diagnostic_cluster();
        // (1,0), (2,0), (2,1) close a triangle on {0, 1, 2} and skip node 3.
        assert!(SpanningTree::new(&g, vec![0, 1, 2]).is_err());
    }

    #[test]
    fn ids_are_canonical_and_distinct() {
        let g = diagnostic_cluster();
        let a = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        let b = SpanningTree::new(&g, vec![3, 4, 5]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().to_string(), "101001");
        assert_eq!(b.id().to_string(), "000111");
    }

    #[test]
    fn path_between_follows_the_chain() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        // Tree is the chain 0 - 1 - 2 - 3; path 0 -> 3 walks all three edges
        // against their dependency direction.
        let path = tree.path_between(&g, 0, 3).unwrap();
        assert_eq!(
            path,
            vec![
                PathStep { edge: 0, forward: false },
                PathStep { edge: 2, forward: false },
                PathStep { edge: 5, forward: false },
            ]
        );
        // And the reverse walks them forward.
        let back = tree.path_between(&g, 3, 0).unwrap();
        assert!(back.iter().all(|s| s.forward));
    }

    #[test]
    fn random_tree_is_valid_and_deterministic() {
        let g = diagnostic_cluster();
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_spanning_tree(&g, &mut rng).unwrap();
        assert_eq!(a.edges().len(), 3);

        let mut rng2 = StdRng::seed_from_u64(7);
        let b = random_spanning_tree(&g, &mut rng2).unwrap();
        assert_eq!(a.id(), b.id());
    }
}
