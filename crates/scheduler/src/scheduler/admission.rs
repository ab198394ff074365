use std::sync::Arc;

use nous_core::PutResult;
use tracing::trace;

use crate::config::FiringPolicy;
use crate::memory::lock;
use crate::task::{Stamp, Task, TaskLink};

use super::Scheduler;

/// Outcome of offering a task to the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued for a later cycle.
    Queued,
    /// A task with the same stamp was already pending; budgets merged.
    Merged,
    /// Queued; the lowest-ranked pending task was shed to make room.
    Displaced(Stamp),
    /// At or below the activation threshold. Dropped silently.
    BelowThreshold,
    /// Ranked below every task in a full queue. Dropped silently.
    Shed,
}

impl Admission {
    pub fn accepted(&self) -> bool {
        matches!(
            self,
            Admission::Queued | Admission::Merged | Admission::Displaced(_)
        )
    }
}

/// Per-cycle admission counts.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct AdmitTally {
    pub processed: u64,
    pub dropped: u64,
    pub shed: u64,
    pub failures: u64,
}

impl Scheduler {
    /// Offer a task for processing in a later cycle.
    pub fn input(&self, task: Task) -> Admission {
        let stamp = task.stamp;
        let admission = self.enqueue(task);
        trace!(%stamp, ?admission, "input offered");
        admission
    }

    /// Push into the pending queue; shared by external input and derived
    /// tasks.
    pub(super) fn enqueue(&self, task: Task) -> Admission {
        if !task.budget.above_threshold(self.config.activation_epsilon) {
            self.with_metrics(|m| m.inputs_dropped += 1);
            return Admission::BelowThreshold;
        }
        let admission = match lock(&self.pending).push(task) {
            PutResult::Inserted => Admission::Queued,
            PutResult::Merged => Admission::Merged,
            PutResult::Evicted(shed) => Admission::Displaced(shed.stamp),
            PutResult::Rejected(_) => Admission::Shed,
        };
        self.with_metrics(|m| match admission {
            Admission::Shed => m.inputs_shed += 1,
            Admission::Displaced(_) => {
                m.inputs_accepted += 1;
                m.inputs_shed += 1;
            }
            _ => m.inputs_accepted += 1,
        });
        admission
    }

    /// Tasks this cycle processes, highest rank first.
    ///
    /// Batch: up to `inputs_per_cycle` pending tasks pass through the
    /// bounded task buffer, which is then drained completely. Continuous:
    /// the pending queue is drained unconditionally.
    fn take_admissions(&self, tally: &mut AdmitTally) -> Vec<Task> {
        match self.config.policy {
            FiringPolicy::Batch => {
                let moved = lock(&self.pending).drain_descending(self.config.inputs_per_cycle);
                let mut buffer = lock(&self.task_buffer);
                for task in moved {
                    if let PutResult::Evicted(_) | PutResult::Rejected(_) = buffer.push(task) {
                        tally.shed += 1;
                    }
                }
                buffer.drain_descending(usize::MAX)
            }
            FiringPolicy::Continuous => lock(&self.pending).drain_descending(usize::MAX),
        }
    }

    /// Admission step: conceptualize each task's term, link the task into
    /// its concept, then run direct processing.
    pub(super) fn admit(&self, derived: &mut Vec<Task>) -> AdmitTally {
        let mut tally = AdmitTally::default();
        for task in self.take_admissions(&mut tally) {
            if !task.budget.above_threshold(self.config.activation_epsilon) {
                tally.dropped += 1;
                continue;
            }
            // The handle shares link storage with wherever the concept
            // ended up, resident or parked in the cache.
            if let Some(concept) = self.memory.conceptualize(&task.term, task.budget, true) {
                let _ = concept
                    .links()
                    .put_task_link(TaskLink::new(Arc::new(task.clone())));
            }
            tally.processed += 1;
            let ok = self.guarded("direct", &task.term, derived, || {
                self.processor.process_direct(&self.memory, &task)
            });
            if !ok {
                tally.failures += 1;
            }
        }
        tally
    }
}
