//! Phase 1: The Cluster (Data Ingest)
//!
//! Responsible for:
//! - The fixed transaction dependency DAG with fee/weight attributes
//! - Seeded random cluster generation with connectivity repair
//! - Spanning trees and their canonical bit-set identifiers

mod generate;
mod graph;
mod tree;

pub use generate::ClusterGenerator;
pub use graph::{diagnostic_cluster, DepEdge, DependencyGraph, TxNode};
pub use tree::{random_spanning_tree, PathStep, SpanningTree, TreeId};
