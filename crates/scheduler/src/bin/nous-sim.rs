//! nous-sim — drives the scheduler with synthetic input.
//!
//! Each input task names one word from a fixed vocabulary. A toy premise
//! processor links every word to its two neighbours and, on indirect
//! processing, derives a weaker task for each drawn neighbour. Derived
//! budgets halve at every step, so activity dies out unless fresh input
//! keeps arriving. Metrics are printed as JSON at the end.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use nous_core::Budget;
use nous_scheduler::{
    Concept, FiringPolicy, Memory, PremiseProcessor, ProcessError, Scheduler, SchedulerConfig,
    Task, TaskLink, Term, TermLink,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Run the attention scheduler against a synthetic word-association workload.
#[derive(Parser, Debug)]
#[command(name = "nous-sim", version, about)]
struct Cli {
    /// Path to a scheduler TOML config. Defaults apply when omitted.
    #[arg(long, env = "NOUS_CONFIG")]
    config: Option<String>,

    /// Number of cycles to run.
    #[arg(long, default_value_t = 500)]
    cycles: u64,

    /// Number of external input tasks, one per cycle from the start.
    #[arg(long, default_value_t = 200)]
    inputs: u64,

    /// Distinct words in the synthetic vocabulary.
    #[arg(long, default_value_t = 64)]
    vocabulary: usize,

    /// Use the continuous (wave) firing policy.
    #[arg(long)]
    continuous: bool,

    /// Pretty-print the metrics JSON.
    #[arg(long)]
    pretty: bool,
}

// ── Toy processor ───────────────────────────────────────────────────

struct NeighbourProcessor {
    vocabulary: usize,
}

impl NeighbourProcessor {
    fn word(&self, i: usize) -> Term {
        Term::new(format!("w{}", i % self.vocabulary))
    }

    fn index(term: &Term) -> Option<usize> {
        term.as_str().strip_prefix('w')?.parse().ok()
    }
}

impl PremiseProcessor for NeighbourProcessor {
    fn process_direct(&self, memory: &Memory, task: &Task) -> Result<Vec<Task>, ProcessError> {
        let i = Self::index(&task.term)
            .ok_or_else(|| ProcessError::Failed(format!("unknown word {}", task.term)))?;
        let link_budget = task.budget.scaled(0.8);
        for neighbour in [i + 1, i + self.vocabulary - 1] {
            memory.link_term(&task.term, self.word(neighbour), link_budget);
        }
        Ok(Vec::new())
    }

    fn process_indirect(
        &self,
        memory: &Memory,
        _concept: &Concept,
        task_link: &TaskLink,
        term_links: &[TermLink],
    ) -> Result<Vec<Task>, ProcessError> {
        Ok(term_links
            .iter()
            .map(|link| {
                Task::new(
                    memory.next_stamp(),
                    link.target.clone(),
                    task_link.budget.scaled(0.5),
                )
                .with_parent(task_link.task.stamp)
            })
            .collect())
    }
}

// ── Main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.vocabulary > 0, "--vocabulary must be at least 1");

    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("loading scheduler config from {path}"))?,
        None => SchedulerConfig::from_toml("").context("applying environment overrides")?,
    };
    if cli.continuous {
        config.policy = FiringPolicy::Continuous;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let processor = Arc::new(NeighbourProcessor {
        vocabulary: cli.vocabulary,
    });
    let scheduler = Scheduler::standard(config, processor.clone())?;
    let memory = scheduler.memory();

    info!(
        cycles = cli.cycles,
        inputs = cli.inputs,
        vocabulary = cli.vocabulary,
        policy = ?scheduler.policy(),
        "starting simulation"
    );

    let started = Instant::now();
    for cycle in 0..cli.cycles {
        if cycle < cli.inputs {
            let word = processor.word(rng.gen_range(0..cli.vocabulary));
            let budget = Budget::new(rng.gen_range(0.3..1.0), rng.gen_range(0.2..0.9), 0.5);
            let _ = scheduler.input(Task::new(memory.next_stamp(), word, budget));
        }
        scheduler.cycle()?;
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        concepts = scheduler.concept_count(),
        "simulation finished"
    );

    let metrics = scheduler.metrics();
    let json = if cli.pretty {
        serde_json::to_string_pretty(&metrics)?
    } else {
        serde_json::to_string(&metrics)?
    };
    println!("{json}");
    scheduler.shutdown();
    Ok(())
}
