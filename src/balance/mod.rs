//! Phase 2: The Balance Engine
//!
//! The flow-based spanning-tree rebalancing core:
//! - Derive per-edge signed flow from node excess (bottom-up over the tree)
//! - Build the augmented graph with saturation/residual/candidate arcs
//! - Check strong connectivity (split when it fails)
//! - Find the cheapest cycle through the most-negative edge
//! - Apply the pushed flow and repair the tree structure
//!
//! Every invariant violation here is fatal: this is research code validating
//! a hypothesis, and a broken invariant means the hypothesis machinery itself
//! is wrong, so the trial aborts with a full diagnostic dump.

mod engine;
mod flow;
mod residual;
mod search;
mod update;

pub use engine::{find_split_merge, Outcome};
pub use flow::{derive, FlowAssignment};
pub use residual::{build_augmented, Arc, ArcKind, AugmentedGraph};
pub use search::{best_path, BestPath, PathCost};
pub use update::apply_cycle;
