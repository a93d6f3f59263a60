//! Debug Rendering
//!
//! Graph-description dumps in graphviz-flavored text: the cluster with its
//! fee/weight attributes, a flow assignment over a tree, and the augmented
//! graph with its SCC partition. Triggered in debug mode and attached to
//! fatal invariant reports; not part of the programmatic contract.

use std::fmt::Write;

use crate::balance::{ArcKind, AugmentedGraph, FlowAssignment};
use crate::cluster::{DependencyGraph, SpanningTree};

pub fn describe_cluster(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph cluster {{");
    let _ = writeln!(
        out,
        "  // total_fee={} total_weight={}",
        graph.total_fee(),
        graph.total_weight()
    );
    for v in 0..graph.node_count() {
        let tx = graph.node(v);
        let _ = writeln!(
            out,
            "  {v} [fee={} weight={} excess={}];",
            tx.fee,
            tx.weight,
            graph.excess(v)
        );
    }
    for edge in graph.edges() {
        let _ = writeln!(out, "  {} -> {};", edge.from, edge.to);
    }
    let _ = writeln!(out, "}}");
    out
}

pub fn describe_flow(
    graph: &DependencyGraph,
    tree: &SpanningTree,
    flows: &FlowAssignment,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph flow {{ // tree {}", tree.id());
    for &idx in tree.edges() {
        let edge = graph.edge(idx);
        let _ = writeln!(
            out,
            "  {} -> {} [flow={}];",
            edge.from,
            edge.to,
            flows.get(idx)
        );
    }
    let _ = writeln!(out, "}}");
    out
}

pub fn describe_augmented(graph: &DependencyGraph, aug: &AugmentedGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph augmented {{");
    for (i, component) in aug.components().iter().enumerate() {
        let _ = writeln!(out, "  // scc {i}: {component:?}");
    }
    for arc_ix in aug.graph.edge_indices() {
        let arc = aug.arc(arc_ix);
        let edge = graph.edge(arc.edge);
        let (from, to, label) = match arc.kind {
            ArcKind::Saturated => (edge.from, edge.to, "saturated".to_string()),
            ArcKind::Residual { capacity } => (edge.to, edge.from, format!("residual cap={capacity}")),
            ArcKind::Candidate => (edge.from, edge.to, "candidate".to_string()),
        };
        let _ = writeln!(out, "  {from} -> {to} [label=\"{label}\"];");
    }
    let _ = writeln!(out, "}}");
    out
}
