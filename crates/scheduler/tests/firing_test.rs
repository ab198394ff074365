//! Integration tests for concept firing under both policies.
//!
//! These tests drive whole cycles through a scripted premise processor and
//! check reproducibility, wave timing and failure isolation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nous_core::Budget;
use nous_scheduler::{
    Concept, FiringPolicy, Memory, PremiseProcessor, ProcessError, Scheduler, SchedulerConfig,
    Task, TaskLink, Term, TermLink,
};

// ── Processors ──────────────────────────────────────────────────────

/// Links every term to its successor (`a` to `a+`) and derives one task per
/// drawn term-link. Records every call in order.
#[derive(Default)]
struct ChainProcessor {
    log: Mutex<Vec<String>>,
}

impl ChainProcessor {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn indirect_calls(&self, term: &str) -> usize {
        let prefix = format!("indirect {term} ");
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .count()
    }
}

impl PremiseProcessor for ChainProcessor {
    fn process_direct(&self, memory: &Memory, task: &Task) -> Result<Vec<Task>, ProcessError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("direct {} {}", task.term, task.stamp));
        let next = Term::new(format!("{}+", task.term));
        memory.link_term(&task.term, next, task.budget.scaled(0.8));
        Ok(Vec::new())
    }

    fn process_indirect(
        &self,
        memory: &Memory,
        concept: &Concept,
        task_link: &TaskLink,
        term_links: &[TermLink],
    ) -> Result<Vec<Task>, ProcessError> {
        let derived: Vec<Task> = term_links
            .iter()
            .map(|link| {
                Task::new(
                    memory.next_stamp(),
                    link.target.clone(),
                    task_link.budget.scaled(0.6),
                )
                .with_parent(task_link.task.stamp)
            })
            .collect();
        let targets: Vec<String> = derived
            .iter()
            .map(|t| format!("{}{}", t.term, t.stamp))
            .collect();
        self.log.lock().unwrap().push(format!(
            "indirect {} {} -> {}",
            concept.term(),
            task_link.task.stamp,
            targets.join(",")
        ));
        Ok(derived)
    }
}

/// Fails or panics on chosen terms.
struct FlakyProcessor;

impl PremiseProcessor for FlakyProcessor {
    fn process_direct(&self, _memory: &Memory, task: &Task) -> Result<Vec<Task>, ProcessError> {
        match task.term.as_str() {
            "bad" => Err(ProcessError::Failed("rejected premise".into())),
            "boom" => panic!("direct processing exploded"),
            _ => Ok(Vec::new()),
        }
    }

    fn process_indirect(
        &self,
        _memory: &Memory,
        concept: &Concept,
        _task_link: &TaskLink,
        _term_links: &[TermLink],
    ) -> Result<Vec<Task>, ProcessError> {
        if concept.term().as_str() == "boom" {
            panic!("indirect processing exploded");
        }
        Ok(Vec::new())
    }
}

fn feed(s: &Scheduler, inputs: &[(&str, f32)]) {
    for (term, p) in inputs {
        let stamp = s.memory().next_stamp();
        s.input(Task::new(stamp, *term, Budget::new(*p, 0.5, 0.5)));
    }
}

// ── Batch ───────────────────────────────────────────────────────────

fn batch_run(config: SchedulerConfig) -> (Vec<String>, Vec<(String, Budget)>) {
    let processor = Arc::new(ChainProcessor::default());
    let s = Scheduler::standard(config, processor.clone()).unwrap();
    feed(&s, &[("a", 0.9), ("b", 0.7), ("c", 0.5), ("a", 0.6)]);
    s.run_cycles(30).unwrap();
    let snapshot = s
        .concepts()
        .iter()
        .map(|c| (c.term().to_string(), c.budget))
        .collect();
    (processor.log(), snapshot)
}

#[test]
fn batch_runs_are_reproducible() {
    let config = SchedulerConfig {
        max_concepts: 6,
        ..SchedulerConfig::default()
    };
    let (log_a, concepts_a) = batch_run(config.clone());
    let (log_b, concepts_b) = batch_run(config);

    assert!(log_a.iter().any(|line| line.starts_with("indirect")));
    assert!(!concepts_a.is_empty());
    assert_eq!(log_a, log_b);
    assert_eq!(concepts_a, concepts_b);
}

#[test]
fn batch_derivations_surface_as_new_concepts() {
    let processor = Arc::new(ChainProcessor::default());
    let s = Scheduler::standard(SchedulerConfig::default(), processor.clone()).unwrap();
    feed(&s, &[("x", 0.9)]);

    let first = s.cycle().unwrap();
    assert_eq!(first.admitted, 1);
    assert!(first.derived >= 1);
    assert!(s.concept(&Term::new("x+")).is_none());

    s.cycle().unwrap();
    assert!(s.concept(&Term::new("x+")).is_some());
}

#[test]
fn processor_failures_are_isolated() {
    let config = SchedulerConfig {
        inputs_per_cycle: 3,
        ..SchedulerConfig::default()
    };
    let s = Scheduler::standard(config, Arc::new(FlakyProcessor)).unwrap();
    feed(&s, &[("bad", 0.5), ("boom", 0.5), ("fine", 0.5)]);

    let report = s.cycle().unwrap();
    assert_eq!(report.admitted, 3);
    // Two direct failures plus the panicking indirect call.
    assert_eq!(report.failures, 3);
    assert_eq!(report.fired, 3);
    for term in ["bad", "boom", "fine"] {
        assert!(s.concept(&Term::new(term)).is_some(), "{term} missing");
    }

    assert!(s.cycle().is_ok());
    assert_eq!(s.metrics().processor_failures, 4);
    assert_eq!(s.metrics().cycles, 2);
}

// ── Continuous ──────────────────────────────────────────────────────

#[test]
fn wave_fires_strong_concepts_more_often() {
    let config = SchedulerConfig {
        policy: FiringPolicy::Continuous,
        min_term_link: 1,
        priority_decay_rate: 1.0,
        link_decay_rate: 1.0,
        ..SchedulerConfig::default()
    };
    let processor = Arc::new(ChainProcessor::default());
    let s = Scheduler::standard(config, processor.clone()).unwrap();
    feed(&s, &[("hot", 1.0), ("cold", 0.1)]);

    s.run_cycles(24).unwrap();

    // hot: delay 1, due from tick 2. cold: delay 6, due at 7, 13 and 19.
    let hot = processor.indirect_calls("hot");
    let cold = processor.indirect_calls("cold");
    assert_eq!(hot, 23);
    assert_eq!(cold, 3);
}

#[test]
fn wave_counts_match_between_sequential_and_parallel() {
    let mut tallies = HashMap::new();
    for parallel in [false, true] {
        let config = SchedulerConfig {
            policy: FiringPolicy::Continuous,
            min_term_link: 1,
            priority_decay_rate: 1.0,
            link_decay_rate: 1.0,
            parallel_firing: parallel,
            worker_threads: 4,
            ..SchedulerConfig::default()
        };
        let processor = Arc::new(ChainProcessor::default());
        let s = Scheduler::standard(config, processor.clone()).unwrap();
        feed(&s, &[("p", 1.0), ("q", 1.0), ("r", 1.0), ("s", 1.0)]);
        s.run_cycles(5).unwrap();
        let counts: Vec<usize> = ["p", "q", "r", "s"]
            .iter()
            .map(|t| processor.indirect_calls(t))
            .collect();
        tallies.insert(parallel, counts);
    }
    assert_eq!(tallies[&false], tallies[&true]);
    assert_eq!(tallies[&false], vec![4, 4, 4, 4]);
}
