//! Exploration Driver
//!
//! Step 3.2: The Trial Loop
//!
//! Bounded random-trial loop with a fixed seed: generate a cluster, sample
//! a spanning tree, and iterate the balance engine until a sentinel is
//! reached. Every Rebalanced transition must strictly improve the
//! negative-flow score; a regression is a defect and aborts the trial.

use chrono::{DateTime, Utc};
use eyre::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::balance::{find_split_merge, Outcome};
use crate::cluster::{random_spanning_tree, ClusterGenerator};
use crate::config::Config;
use crate::render;

use super::meta::MetaGraph;

/// How a trial settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialEnd {
    /// Reached a balanced tree (terminal sentinel).
    Balanced,
    /// Reached a tree that must split (split sentinel).
    Split,
    /// Step bound exhausted without a sentinel - a convergence failure.
    StepLimit,
}

/// One trial's record, written as a JSON line when report logging is on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    pub timestamp: DateTime<Utc>,
    pub trial: usize,
    pub nodes: usize,
    pub edges: usize,
    pub start_score: i64,
    pub final_score: i64,
    pub steps: usize,
    pub end: TrialEnd,
}

impl TrialReport {
    /// Append this report to a JSON-lines file.
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Aggregate statistics over a full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub trials: usize,
    pub balanced: usize,
    pub split: usize,
    pub step_limited: usize,
    pub total_steps: usize,
}

/// Drives the balance engine over seeded random clusters and folds every
/// transition into the meta-graph.
pub struct Explorer {
    config: Config,
    pub meta: MetaGraph,
}

impl Explorer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            meta: MetaGraph::new(),
        }
    }

    /// Run one trial: fresh cluster, fresh meta-graph transitions.
    ///
    /// The meta-graph identifies trees by their edge bit-set, which is only
    /// meaningful within one cluster, so each trial gets its own MetaGraph.
    pub fn run_trial(&mut self, rng: &mut StdRng, trial: usize) -> Result<TrialReport> {
        let generator = ClusterGenerator {
            min_fee: self.config.min_fee,
            max_fee: self.config.max_fee,
            min_weight: self.config.min_weight,
            max_weight: self.config.max_weight,
            extra_edges: self.config.extra_edges,
        };
        let n = rng.gen_range(self.config.min_nodes..=self.config.max_nodes);
        let graph = generator.generate(rng, n)?;
        if self.config.debug_dumps {
            debug!("cluster:\n{}", render::describe_cluster(&graph));
        }

        self.meta = MetaGraph::new();
        let mut tree = random_spanning_tree(&graph, rng)?;
        let mut steps = 0;
        let mut end = TrialEnd::StepLimit;
        let mut start_score = None;
        let mut last_score = None;

        loop {
            if steps >= self.config.max_steps {
                warn!(trial, steps, "step bound exhausted without a sentinel");
                break;
            }
            let id = tree.id();
            let outcome = find_split_merge(&graph, &tree)?;
            let score = outcome.score();
            self.meta.record_score(id.clone(), score);
            if start_score.is_none() {
                debug!(trial, score, tree = %id, "trial start");
                start_score = Some(score);
            }
            if let Some(prev) = last_score {
                if score <= prev {
                    bail!(
                        "trial {trial}: score regressed or stalled ({prev} -> {score}) at step {steps}"
                    );
                }
            }
            last_score = Some(score);

            match outcome {
                Outcome::Balanced { .. } => {
                    self.meta.record_terminal(id);
                    end = TrialEnd::Balanced;
                    break;
                }
                Outcome::MustSplit { drop_edge, .. } => {
                    debug!(trial, drop_edge, "split requested");
                    self.meta.record_split(id);
                    end = TrialEnd::Split;
                    break;
                }
                Outcome::Rebalanced { new_tree, .. } => {
                    self.meta.record_improve(id, new_tree.id());
                    tree = new_tree;
                    steps += 1;
                }
            }
        }

        if !self.meta.improving_is_acyclic() {
            bail!("trial {trial}: improving transitions formed a cycle");
        }

        let report = TrialReport {
            timestamp: Utc::now(),
            trial,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            start_score: start_score.unwrap_or(0),
            final_score: last_score.unwrap_or(0),
            steps,
            end,
        };
        if self.config.report_log {
            report.append_to_file(&self.config.report_log_path)?;
        }
        Ok(report)
    }

    /// Run all configured trials with `on_trial` called after each one
    /// (progress reporting hook for the binary).
    pub fn run(&mut self, mut on_trial: impl FnMut(&TrialReport)) -> Result<RunSummary> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut summary = RunSummary::default();

        for trial in 0..self.config.trials {
            let report = self.run_trial(&mut rng, trial)?;
            summary.trials += 1;
            summary.total_steps += report.steps;
            match report.end {
                TrialEnd::Balanced => summary.balanced += 1,
                TrialEnd::Split => summary.split += 1,
                TrialEnd::StepLimit => summary.step_limited += 1,
            }
            on_trial(&report);
        }

        info!(
            trials = summary.trials,
            balanced = summary.balanced,
            split = summary.split,
            step_limited = summary.step_limited,
            "exploration finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            trials: 10,
            min_nodes: 5,
            max_nodes: 8,
            extra_edges: 4,
            min_fee: 1,
            max_fee: 25,
            min_weight: 1,
            max_weight: 25,
            seed: 99,
            max_steps: 64,
            debug_dumps: false,
            report_log: false,
            report_log_path: String::new(),
        }
    }

    #[test]
    fn trials_settle_within_the_step_bound() {
        let mut explorer = Explorer::new(test_config());
        let summary = explorer.run(|_| {}).unwrap();
        assert_eq!(summary.trials, 10);
        assert_eq!(summary.step_limited, 0);
        assert_eq!(summary.balanced + summary.split, 10);
    }

    #[test]
    fn runs_are_reproducible() {
        let mut a = Explorer::new(test_config());
        let mut b = Explorer::new(test_config());
        let mut ends_a = Vec::new();
        let mut ends_b = Vec::new();
        a.run(|r| ends_a.push((r.end, r.steps, r.final_score))).unwrap();
        b.run(|r| ends_b.push((r.end, r.steps, r.final_score))).unwrap();
        assert_eq!(ends_a, ends_b);
    }
}
