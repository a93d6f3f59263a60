//! Engine Orchestration
//!
//! Step 2.5: find_split_merge
//!
//! One rebalancing step per invocation. The core never touches the caller's
//! meta-graph: it returns a tagged outcome and the exploration driver
//! records the transition.

use eyre::{eyre, Result};
use tracing::debug;

use crate::cluster::{DependencyGraph, SpanningTree};

use super::flow::derive;
use super::residual::build_augmented;
use super::search::best_path;
use super::update::apply_cycle;

/// Result of one `find_split_merge` invocation. `score` is always the
/// negative-flow sum of the INPUT tree.
#[derive(Debug)]
pub enum Outcome {
    /// No negative flow; the tree is balanced and terminal.
    Balanced { score: i64 },
    /// Augmented graph is not strongly connected; rerouting cannot help.
    /// The caller splits, canonically by dropping `drop_edge`.
    MustSplit { score: i64, drop_edge: usize },
    /// One negative-flow cycle canceled; the tree moved forward.
    Rebalanced { score: i64, new_tree: SpanningTree },
}

impl Outcome {
    pub fn score(&self) -> i64 {
        match self {
            Outcome::Balanced { score }
            | Outcome::MustSplit { score, .. }
            | Outcome::Rebalanced { score, .. } => *score,
        }
    }
}

/// Run one rebalancing step on `tree`.
///
/// Flow and the augmented graph are rebuilt fresh on every call; nothing
/// persists between invocations.
pub fn find_split_merge(graph: &DependencyGraph, tree: &SpanningTree) -> Result<Outcome> {
    let mut flows = derive(graph, tree)?;
    let score = flows.negative_sum();

    if !flows.has_negative() {
        debug!(tree = %tree.id(), "tree is balanced");
        return Ok(Outcome::Balanced { score });
    }

    let (aug, most_negative) = build_augmented(graph, tree, &flows);
    let neg_edge = most_negative
        .ok_or_else(|| eyre!("negative flow present but no most-negative tree edge found"))?;

    if !aug.is_single_component() {
        debug!(tree = %tree.id(), drop_edge = neg_edge, "tree must split");
        return Ok(Outcome::MustSplit {
            score,
            drop_edge: neg_edge,
        });
    }

    // Cycle through the most-negative edge: search from its head back to
    // its tail, close with the edge itself.
    let dep = graph.edge(neg_edge);
    let path = best_path(&aug, dep.to, dep.from)?;

    // The path bottleneck is additionally capped at the amount that zeroes
    // the edge being canceled; an all-unbounded path pushes exactly that.
    let cancelable = -flows.get(neg_edge);
    let push = path.bottleneck.map_or(cancelable, |b| b.min(cancelable));

    let new_tree = apply_cycle(graph, tree, &mut flows, &aug, &path, neg_edge, push)?;
    Ok(Outcome::Rebalanced { score, new_tree })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{diagnostic_cluster, random_spanning_tree, DependencyGraph, TxNode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn balanced_tree_is_terminal_and_idempotent() {
        let g = diagnostic_cluster();
        let tree = SpanningTree::new(&g, vec![0, 2, 5]).unwrap();
        for _ in 0..2 {
            match find_split_merge(&g, &tree).unwrap() {
                Outcome::Balanced { score } => assert_eq!(score, 0),
                other => panic!("expected Balanced, got {other:?}"),
            }
        }
    }

    #[test]
    fn star_tree_converges_in_two_steps() {
        let g = diagnostic_cluster();
        let mut tree = SpanningTree::new(&g, vec![3, 4, 5]).unwrap();

        // Step 1: cancel (3, 2) via candidate (2, 0).
        let outcome = find_split_merge(&g, &tree).unwrap();
        let Outcome::Rebalanced { score, new_tree } = outcome else {
            panic!("expected Rebalanced");
        };
        assert_eq!(score, -100);
        assert_eq!(new_tree.edges(), &[1, 3, 4]);
        tree = new_tree;

        // Step 2: cancel (3, 1) via candidate (1, 0).
        let outcome = find_split_merge(&g, &tree).unwrap();
        let Outcome::Rebalanced { score, new_tree } = outcome else {
            panic!("expected Rebalanced");
        };
        assert_eq!(score, -6);
        assert_eq!(new_tree.edges(), &[0, 1, 3]);
        tree = new_tree;

        // Terminal: the star at node 0 carries only positive flow.
        let outcome = find_split_merge(&g, &tree).unwrap();
        assert!(matches!(outcome, Outcome::Balanced { score: 0 }));
    }

    #[test]
    fn disconnected_augmentation_requests_split() {
        let g = DependencyGraph::new(
            vec![TxNode { fee: 2, weight: 1 }, TxNode { fee: 1, weight: 2 }],
            vec![(1, 0)],
        )
        .unwrap();
        let tree = SpanningTree::new(&g, vec![0]).unwrap();
        match find_split_merge(&g, &tree).unwrap() {
            Outcome::MustSplit { score, drop_edge } => {
                assert_eq!(score, -3);
                assert_eq!(drop_edge, 0);
            }
            other => panic!("expected MustSplit, got {other:?}"),
        }
    }

    #[test]
    fn random_trees_reach_a_sentinel_with_improving_scores() {
        let g = diagnostic_cluster();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tree = random_spanning_tree(&g, &mut rng).unwrap();
            let mut last_score: Option<i64> = None;
            let mut settled = false;

            for _ in 0..64 {
                let outcome = find_split_merge(&g, &tree).unwrap();
                if let Some(prev) = last_score {
                    assert!(
                        prev < outcome.score(),
                        "seed {seed}: score regressed {prev} -> {}",
                        outcome.score()
                    );
                }
                last_score = Some(outcome.score());
                match outcome {
                    Outcome::Rebalanced { new_tree, .. } => tree = new_tree,
                    Outcome::Balanced { .. } | Outcome::MustSplit { .. } => {
                        settled = true;
                        break;
                    }
                }
            }
            assert!(settled, "seed {seed}: no sentinel within 64 steps");
        }
    }
}
