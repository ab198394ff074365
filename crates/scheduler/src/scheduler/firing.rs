use std::panic::{self, AssertUnwindSafe};

use nous_core::Forgetting;
use rayon::prelude::*;
use tracing::{trace, warn};

use crate::concept::Concept;
use crate::processor::ProcessError;
use crate::task::Task;
use crate::term::Term;

use super::Scheduler;

/// Per-cycle firing counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct FireTally {
    pub fired: u64,
    pub skipped: u64,
    pub premises: u64,
    pub failures: u64,
}

impl FireTally {
    fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Self::default()
        }
    }

    fn absorb(&mut self, other: FireTally) {
        self.fired += other.fired;
        self.skipped += other.skipped;
        self.premises += other.premises;
        self.failures += other.failures;
    }
}

/// `round(p * (max - min)) + min`.
pub(super) fn fire_count(priority: f32, min: usize, max: usize) -> usize {
    (priority * max.saturating_sub(min) as f32).round() as usize + min
}

impl Scheduler {
    fn concept_forgetting(&self) -> Forgetting {
        Forgetting::new(self.config.priority_decay_rate, self.config.activation_epsilon)
    }

    fn link_forgetting(&self) -> Forgetting {
        Forgetting::new(self.config.link_decay_rate, self.config.activation_epsilon)
    }

    /// Batch firing: visit every resident concept once, highest rank first,
    /// then decay it. Concepts that decay below threshold are forgotten.
    pub(super) fn fire_batch(&self, derived: &mut Vec<Task>) -> FireTally {
        let forgetting = self.concept_forgetting();
        let mut tally = FireTally::default();
        for concept in self.memory.concepts() {
            tally.absorb(self.fire_concept(&concept, derived));
            self.memory.decay_concept(concept.term(), &forgetting);
        }
        tally
    }

    /// Wave firing: every concept whose due time has elapsed fires once.
    /// Selection and rescheduling happen under the concept-bag lock; the
    /// firings themselves run outside it, in parallel when a pool exists.
    pub(super) fn fire_wave(&self, derived: &mut Vec<Task>) -> FireTally {
        let due = self.memory.take_due(&self.concept_forgetting());
        let mut tally = FireTally::default();
        match &self.pool {
            Some(pool) if due.len() > 1 => {
                let results: Vec<(FireTally, Vec<Task>)> = pool.install(|| {
                    due.par_iter()
                        .map(|concept| {
                            let mut local = Vec::new();
                            let t = self.fire_concept(concept, &mut local);
                            (t, local)
                        })
                        .collect()
                });
                for (t, local) in results {
                    tally.absorb(t);
                    derived.extend(local);
                }
            }
            _ => {
                for concept in &due {
                    tally.absorb(self.fire_concept(concept, derived));
                }
            }
        }
        tally
    }

    /// Fire one concept: draw up to `fires` task-links and, for each, up to
    /// `term_fires` term-links, then run indirect processing once per
    /// task-link. The link mutex is never held across a processor call.
    pub(super) fn fire_concept(&self, concept: &Concept, derived: &mut Vec<Task>) -> FireTally {
        let p = concept.budget.priority();
        let fires = fire_count(p, self.config.min_task_link, self.config.max_task_link);
        let term_fires = fire_count(p, self.config.min_term_link, self.config.max_term_link);
        if fires < 1 || term_fires < 1 {
            trace!(term = %concept.term(), fires, term_fires, "concept skipped");
            return FireTally::skipped();
        }

        let forgetting = self.link_forgetting();
        let task_links = concept.links().draw_task_links(fires, &forgetting);
        if task_links.is_empty() {
            trace!(term = %concept.term(), "concept has no task-links");
            return FireTally::skipped();
        }

        let mut tally = FireTally {
            fired: 1,
            ..FireTally::default()
        };
        for task_link in &task_links {
            let term_links = concept.links().draw_term_links(term_fires, &forgetting);
            tally.premises += 1;
            let ok = self.guarded("indirect", concept.term(), derived, || {
                self.processor
                    .process_indirect(&self.memory, concept, task_link, &term_links)
            });
            if !ok {
                tally.failures += 1;
            }
        }
        trace!(term = %concept.term(), premises = tally.premises, "concept fired");
        tally
    }

    /// Run a processor call, catching both errors and panics. Derived tasks
    /// are appended to `derived`. Returns whether the call succeeded.
    pub(super) fn guarded<F>(
        &self,
        stage: &'static str,
        term: &Term,
        derived: &mut Vec<Task>,
        call: F,
    ) -> bool
    where
        F: FnOnce() -> Result<Vec<Task>, ProcessError>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(call))
            .unwrap_or_else(|payload| Err(ProcessError::from_panic(payload)));
        match result {
            Ok(tasks) => {
                derived.extend(tasks);
                true
            }
            Err(e) => {
                warn!(stage, term = %term, error = %e, "premise processor failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fire_count;

    #[test]
    fn fire_count_scales_with_priority() {
        assert_eq!(fire_count(1.0, 0, 9), 9);
        assert_eq!(fire_count(0.5, 0, 9), 5);
        assert_eq!(fire_count(0.0, 1, 3), 1);
        assert_eq!(fire_count(0.04, 0, 9), 0);
        assert_eq!(fire_count(0.9, 2, 2), 2);
    }
}
