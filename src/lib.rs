//! Treeflow - Spanning-Tree Flow Rebalancing Explorer
//!
//! Studies a single algorithmic question: does iterative flow-cycle-canceling
//! on a spanning tree of a transaction dependency cluster converge to a
//! cycle-free chain of strictly improving states?
//!
//! Pipeline per step:
//! cluster -> flow derivation -> augmented graph -> SCC check -> best-path
//! search -> tree update, emitted as one transition in the meta-graph.

pub mod balance;
pub mod cluster;
pub mod config;
pub mod explore;
pub mod render;
