//! Phase 3: The Explorer
//!
//! Responsible for:
//! - The meta-graph of tree-to-tree transitions with terminal/split sentinels
//! - The bounded random-trial loop driving the balance engine
//! - Monotonic-score checking and trial reporting

mod driver;
mod meta;

pub use driver::{Explorer, RunSummary, TrialEnd, TrialReport};
pub use meta::{MetaGraph, MetaNode, TransitionKind};
