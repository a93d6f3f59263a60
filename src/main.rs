//! Treeflow - Spanning-Tree Flow Rebalancing Explorer
//!
//! Run with: cargo run
//!
//! Drives a bounded random-trial loop with a fixed seed: each trial builds a
//! random dependency cluster, samples a spanning tree, and iterates the
//! balance engine until the tree is balanced or must split, checking that
//! every cycle-canceling step strictly improves the negative-flow score and
//! that the transition meta-graph stays acyclic.

use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use treeflow::config::Config;
use treeflow::explore::{Explorer, TrialEnd};

#[derive(Parser)]
#[command(name = "treeflow", about = "Spanning-tree flow rebalancing explorer")]
struct Cli {
    /// TOML configuration file (environment variables otherwise).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of trials.
    #[arg(long)]
    trials: Option<usize>,

    /// Override the RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Dump cluster/flow/augmented graph descriptions while running.
    #[arg(long)]
    debug: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" TREEFLOW - Spanning-Tree Flow Rebalancing Explorer")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("treeflow=info".parse()?),
        )
        .init();

    print_banner();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(trials) = cli.trials {
        config.trials = trials;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.debug {
        config.debug_dumps = true;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }
    config.print_summary();
    println!();

    let bar = ProgressBar::new(config.trials as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} trials {msg}")
            .expect("static progress template"),
    );

    let start = Instant::now();
    let mut explorer = Explorer::new(config);
    let summary = explorer.run(|report| {
        bar.set_message(format!(
            "last: {} steps, score {} -> {}",
            report.steps, report.start_score, report.final_score
        ));
        bar.inc(1);
    })?;
    bar.finish_and_clear();

    let elapsed = start.elapsed();
    println!();
    println!("{}", style("═══ EXPLORATION SUMMARY ═══").yellow().bold());
    println!();
    println!(
        "  {} {} trials in {:?}",
        style("✓").green(),
        summary.trials,
        elapsed
    );
    println!("  Balanced (terminal): {}", summary.balanced);
    println!("  Must split:          {}", summary.split);
    println!("  Rebalancing steps:   {}", summary.total_steps);
    if summary.step_limited > 0 {
        println!(
            "  {} {} trials hit the step bound - convergence failure",
            style("✗").red(),
            summary.step_limited
        );
    } else {
        println!(
            "  {} every trial settled; improving transitions stayed acyclic",
            style("✓").green()
        );
    }
    println!();

    let end_counts = [
        (TrialEnd::Balanced, summary.balanced),
        (TrialEnd::Split, summary.split),
    ];
    for (end, count) in end_counts {
        let pct = 100.0 * count as f64 / summary.trials.max(1) as f64;
        println!("  {end:?}: {pct:.1}%");
    }

    Ok(())
}
