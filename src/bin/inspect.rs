//! Diagnostic tool - walk the fixed reference cluster step by step
//!
//! Run with: cargo run --bin inspect
//!
//! Uses the 4-transaction diagnostic cluster and prints every dump the
//! engine can produce: excess values, flow derivation, the augmented graph
//! with its SCC partition, and each rebalancing transition until the tree
//! is balanced.

use color_eyre::eyre::Result;

use treeflow::balance::{build_augmented, derive, find_split_merge, Outcome};
use treeflow::cluster::{diagnostic_cluster, SpanningTree};
use treeflow::render;

fn main() -> Result<()> {
    color_eyre::install()?;

    println!("TREEFLOW DIAGNOSTIC WALK\n");

    let graph = diagnostic_cluster();
    println!("{}", render::describe_cluster(&graph));

    // Start from the star at node 3 - the interesting tree with two
    // negative-flow edges.
    let mut tree = SpanningTree::new(&graph, vec![3, 4, 5])?;

    for step in 0.. {
        println!("─── step {step}: tree {} ───", tree.id());
        let flows = derive(&graph, &tree)?;
        println!("{}", render::describe_flow(&graph, &tree, &flows));
        println!("score (negative-flow sum): {}\n", flows.negative_sum());

        let (aug, most_negative) = build_augmented(&graph, &tree, &flows);
        println!("{}", render::describe_augmented(&graph, &aug));
        if let Some(edge) = most_negative {
            let dep = graph.edge(edge);
            println!(
                "most negative: edge {edge} ({} -> {}) flow {}\n",
                dep.from,
                dep.to,
                flows.get(edge)
            );
        }

        match find_split_merge(&graph, &tree)? {
            Outcome::Balanced { .. } => {
                println!("balanced - terminal state reached");
                break;
            }
            Outcome::MustSplit { drop_edge, .. } => {
                println!("must split - drop edge {drop_edge}");
                break;
            }
            Outcome::Rebalanced { new_tree, .. } => {
                println!("rebalanced -> {}\n", new_tree.id());
                tree = new_tree;
            }
        }
    }

    Ok(())
}
