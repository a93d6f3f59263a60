//! Tree Flow Update
//!
//! Step 2.4: Applying the Canceled Cycle
//!
//! Pushes the bottleneck flow around the discovered cycle, activates the
//! candidate edges the search chose, and repairs the tree structure: every
//! activated edge closes exactly one undirected cycle with the current
//! tree, a circulation around that cycle drives one edge's flow to zero,
//! and removing that zero-point edge restores the tree invariant.
//!
//! The result must re-encode to a different identifier than the input:
//! rebalancing that makes no forward progress is a fatal defect, not a
//! no-op.

use eyre::{bail, eyre, Result};
use tracing::{debug, trace};

use crate::cluster::{DependencyGraph, SpanningTree};

use super::flow::FlowAssignment;
use super::residual::{ArcKind, AugmentedGraph};
use super::search::BestPath;

/// Apply `push` units of flow along the cycle formed by `path` plus the
/// closing most-negative tree edge, then repair the tree structure around
/// every candidate edge the path activated.
///
/// Returns the new spanning tree; `flows` is updated in place to the new
/// tree's assignment.
pub fn apply_cycle(
    graph: &DependencyGraph,
    tree: &SpanningTree,
    flows: &mut FlowAssignment,
    aug: &AugmentedGraph,
    path: &BestPath,
    closing_edge: usize,
    push: i64,
) -> Result<SpanningTree> {
    if push <= 0 {
        bail!("cycle push must be positive, got {push}");
    }

    // Phase 1: push flow along the path arcs.
    let mut activated = Vec::new();
    for &arc_ix in &path.arcs {
        let arc = aug.arc(arc_ix);
        match arc.kind {
            ArcKind::Saturated => {
                flows.set(arc.edge, flows.get(arc.edge) + push);
            }
            ArcKind::Residual { capacity } => {
                let updated = flows.get(arc.edge) - push;
                if updated < 0 {
                    bail!(
                        "residual overdraw on edge {}: pushed {push} against capacity {capacity}",
                        arc.edge
                    );
                }
                flows.set(arc.edge, updated);
            }
            ArcKind::Candidate => {
                flows.set(arc.edge, push);
                activated.push(arc.edge);
            }
        }
    }
    // Close the cycle through the most-negative edge itself.
    flows.set(closing_edge, flows.get(closing_edge) + push);

    // Phase 2: fold each activated edge into the tree, one at a time,
    // against the tree as it stands after the previous repairs.
    let mut tree_edges: Vec<usize> = tree.edges().to_vec();
    for new_edge in activated {
        repair_with(graph, &mut tree_edges, flows, new_edge)?;
    }

    // Phase 3: re-validate and check forward progress.
    let updated = SpanningTree::new(graph, tree_edges)?;
    if updated.id() == tree.id() {
        bail!(
            "rebalancing made no progress: tree {} re-encoded to itself",
            tree.id()
        );
    }
    debug!(from = %tree.id(), to = %updated.id(), "tree updated");
    Ok(updated)
}

/// One cycle edge with its orientation relative to the circulation
/// direction (+1 with it, -1 against it).
#[derive(Debug, Clone, Copy)]
struct CycleEdge {
    edge: usize,
    orient: i64,
}

/// Fold `new_edge` (already carrying flow) into the tree: circulate flow
/// around the unique cycle it closes until some edge reaches exactly zero,
/// then drop that edge.
fn repair_with(
    graph: &DependencyGraph,
    tree_edges: &mut Vec<usize>,
    flows: &mut FlowAssignment,
    new_edge: usize,
) -> Result<()> {
    let interim = SpanningTree::new(graph, tree_edges.clone())?;
    let dep = graph.edge(new_edge);

    // Cycle direction: through the new edge dependency-forward, back along
    // the tree path from its head to its tail.
    let mut cycle = vec![CycleEdge {
        edge: new_edge,
        orient: 1,
    }];
    for step in interim.path_between(graph, dep.to, dep.from)? {
        cycle.push(CycleEdge {
            edge: step.edge,
            orient: if step.forward { 1 } else { -1 },
        });
    }

    // Evaluate circulating in both rotational directions; each candidate
    // direction stops at its first zero-point.
    let forward = zero_point(&cycle, flows, 1);
    let backward = zero_point(&cycle, flows, -1);

    let (direction, circulation, dropped) = [forward, backward]
        .into_iter()
        .flatten()
        .min_by_key(|z| (z.negatives_after, std::cmp::Reverse(z.circulation)))
        .map(|z| (z.direction, z.circulation, z.dropped))
        .ok_or_else(|| eyre!("no zero-point in either direction around edge {new_edge}"))?;

    trace!(
        new_edge,
        direction,
        circulation,
        dropped,
        "repairing tree around activated edge"
    );

    for ce in &cycle {
        flows.set(ce.edge, flows.get(ce.edge) + ce.orient * direction * circulation);
    }
    flows.remove(dropped);

    tree_edges.push(new_edge);
    tree_edges.retain(|&e| e != dropped);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct ZeroPoint {
    direction: i64,
    /// Non-negative circulation magnitude at which `dropped` hits zero.
    circulation: i64,
    dropped: usize,
    /// Negative-flow edges left on the cycle after circulating.
    negatives_after: usize,
}

/// The first edge to reach zero when circulating `direction` around the
/// cycle, or None when no edge can (flows only strained, never relieved).
fn zero_point(cycle: &[CycleEdge], flows: &FlowAssignment, direction: i64) -> Option<ZeroPoint> {
    let mut best: Option<(i64, usize)> = None;
    for ce in cycle {
        let flow = flows.get(ce.edge);
        // Circulating m units changes this edge by orient * direction * m;
        // it reaches zero only when the change runs against its sign.
        let magnitude = if ce.orient * direction == -1 && flow >= 0 {
            flow
        } else if ce.orient * direction == 1 && flow <= 0 {
            -flow
        } else {
            continue;
        };
        if best.map_or(true, |(m, _)| magnitude < m) {
            best = Some((magnitude, ce.edge));
        }
    }

    let (circulation, dropped) = best?;
    let negatives_after = cycle
        .iter()
        .filter(|ce| flows.get(ce.edge) + ce.orient * direction * circulation < 0)
        .count();
    Some(ZeroPoint {
        direction,
        circulation,
        dropped,
        negatives_after,
    })
}
