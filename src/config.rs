//! Exploration Configuration
//!
//! All parameters for the bounded random-trial loop. Loadable from
//! environment variables (with a .env file) or a TOML file; everything has
//! a reproducible default, including the RNG seed.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Trial Loop ==========
    /// Number of random clusters to explore.
    pub trials: usize,

    /// Inclusive node-count range per cluster.
    pub min_nodes: usize,
    pub max_nodes: usize,

    /// Extra edges sampled beyond the n-1 needed for connectivity.
    pub extra_edges: usize,

    /// RNG seed; fixed for reproducibility.
    pub seed: u64,

    /// Rebalancing steps allowed per trial before declaring a convergence
    /// failure.
    pub max_steps: usize,

    // ========== Cluster Attributes ==========
    pub min_fee: i64,
    pub max_fee: i64,
    pub min_weight: i64,
    pub max_weight: i64,

    // ========== Diagnostics ==========
    /// Dump cluster/flow/augmented graph descriptions while running.
    pub debug_dumps: bool,

    /// Append per-trial JSON reports to `report_log_path`.
    pub report_log: bool,
    pub report_log_path: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables and a .env file.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            trials: env_parse("TRIALS", defaults.trials),
            min_nodes: env_parse("MIN_NODES", defaults.min_nodes),
            max_nodes: env_parse("MAX_NODES", defaults.max_nodes),
            extra_edges: env_parse("EXTRA_EDGES", defaults.extra_edges),
            seed: env_parse("SEED", defaults.seed),
            max_steps: env_parse("MAX_STEPS", defaults.max_steps),
            min_fee: env_parse("MIN_FEE", defaults.min_fee),
            max_fee: env_parse("MAX_FEE", defaults.max_fee),
            min_weight: env_parse("MIN_WEIGHT", defaults.min_weight),
            max_weight: env_parse("MAX_WEIGHT", defaults.max_weight),
            debug_dumps: env_parse("DEBUG_DUMPS", defaults.debug_dumps),
            report_log: env_parse("REPORT_LOG", defaults.report_log),
            report_log_path: env::var("REPORT_LOG_PATH").unwrap_or(defaults.report_log_path),
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(eyre::eyre!("TRIALS must be at least 1"));
        }
        if self.min_nodes < 2 {
            return Err(eyre::eyre!("MIN_NODES must be at least 2"));
        }
        if self.max_nodes < self.min_nodes {
            return Err(eyre::eyre!(
                "MAX_NODES ({}) below MIN_NODES ({})",
                self.max_nodes,
                self.min_nodes
            ));
        }
        if self.min_fee <= 0 || self.min_weight <= 0 {
            return Err(eyre::eyre!("fees and weights must be strictly positive"));
        }
        if self.max_fee < self.min_fee || self.max_weight < self.min_weight {
            return Err(eyre::eyre!("fee/weight ranges are inverted"));
        }
        if self.max_steps == 0 {
            return Err(eyre::eyre!("MAX_STEPS must be at least 1"));
        }
        if self.report_log && self.report_log_path.is_empty() {
            return Err(eyre::eyre!("REPORT_LOG requires REPORT_LOG_PATH"));
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("═══════════════════════════════════════════════");
        println!(" TREEFLOW - CONFIGURATION");
        println!("═══════════════════════════════════════════════");
        println!("  Trials:        {}", self.trials);
        println!("  Nodes:         {}..={}", self.min_nodes, self.max_nodes);
        println!("  Extra edges:   {}", self.extra_edges);
        println!("  Fee range:     {}..={}", self.min_fee, self.max_fee);
        println!("  Weight range:  {}..={}", self.min_weight, self.max_weight);
        println!("  Seed:          {}", self.seed);
        println!("  Max steps:     {}", self.max_steps);
        println!(
            "  Debug dumps:   {}",
            if self.debug_dumps { "on" } else { "off" }
        );
        println!(
            "  Report log:    {}",
            if self.report_log {
                self.report_log_path.as_str()
            } else {
                "off"
            }
        );
        println!("═══════════════════════════════════════════════");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trials: 100,
            min_nodes: 5,
            max_nodes: 8,
            extra_edges: 4,
            seed: 20140,
            max_steps: 256,
            min_fee: 1,
            max_fee: 50,
            min_weight: 1,
            max_weight: 50,
            debug_dumps: false,
            report_log: false,
            report_log_path: "./logs/trials.jsonl".to_string(),
        }
    }
}
