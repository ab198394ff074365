use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nous_core::NousError;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::FiringPolicy;
use crate::memory::lock;

use super::core::SchedulerState;
use super::Scheduler;

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Memory clock after the cycle's tick.
    pub time: u64,
    /// Tasks handed to direct processing.
    pub admitted: u64,
    /// Admitted tasks dropped for being below threshold.
    pub dropped: u64,
    pub fired: u64,
    pub skipped: u64,
    pub premises: u64,
    pub failures: u64,
    /// Derived tasks enqueued at completion.
    pub derived: u64,
}

impl CycleReport {
    /// Nothing was admitted, fired or derived.
    pub fn is_idle(&self) -> bool {
        self.admitted == 0 && self.fired == 0 && self.derived == 0
    }
}

impl Scheduler {
    /// Run one complete cycle: clock tick, admission, firing, then enqueue
    /// derived tasks. Cycles never overlap; a concurrent caller waits.
    pub fn cycle(&self) -> Result<CycleReport, NousError> {
        let _guard = lock(&self.cycle_lock);
        if self.is_stopped() {
            return Err(NousError::Stopped);
        }
        self.state
            .store(SchedulerState::CycleRunning.as_u8(), Ordering::Release);
        let started = Instant::now();

        let time = self.memory.advance_clock();
        let mut derived = Vec::new();
        let admission = self.admit(&mut derived);
        let firing = match self.config.policy {
            FiringPolicy::Batch => self.fire_batch(&mut derived),
            FiringPolicy::Continuous => self.fire_wave(&mut derived),
        };

        // Derived work waits for the next cycle.
        let derived_count = derived.len() as u64;
        for task in derived {
            let _ = self.enqueue(task);
        }

        let elapsed = started.elapsed();
        let mut cycle = 0;
        self.with_metrics(|m| {
            m.tasks_processed += admission.processed;
            m.inputs_dropped += admission.dropped;
            m.inputs_shed += admission.shed;
            m.indirect_premises += firing.premises;
            m.concepts_fired += firing.fired;
            m.concepts_skipped += firing.skipped;
            m.processor_failures += admission.failures + firing.failures;
            m.derived_tasks += derived_count;
            m.record_cycle(elapsed);
            cycle = m.cycles;
        });

        let _ = self.state.compare_exchange(
            SchedulerState::CycleRunning.as_u8(),
            SchedulerState::Idle.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let report = CycleReport {
            cycle,
            time,
            admitted: admission.processed,
            dropped: admission.dropped,
            fired: firing.fired,
            skipped: firing.skipped,
            premises: firing.premises,
            failures: admission.failures + firing.failures,
            derived: derived_count,
        };
        debug!(
            cycle,
            time,
            admitted = report.admitted,
            fired = report.fired,
            derived = report.derived,
            elapsed_us = elapsed.as_micros() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    /// Run `n` cycles. Stops early, without error, once shut down.
    pub fn run_cycles(&self, n: u64) -> Result<u64, NousError> {
        let mut done = 0;
        while done < n {
            match self.cycle() {
                Ok(_) => done += 1,
                Err(NousError::Stopped) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    /// Run cycles until `stop` is raised or the scheduler is shut down.
    /// Both are checked only between cycles.
    pub fn run(&self, stop: &AtomicBool) -> Result<u64, NousError> {
        info!(policy = ?self.config.policy, "Scheduler running");
        let mut done = 0;
        while !stop.load(Ordering::Acquire) {
            match self.cycle() {
                Ok(report) => {
                    done += 1;
                    if report.is_idle() {
                        std::thread::yield_now();
                    }
                }
                Err(NousError::Stopped) => break,
                Err(e) => return Err(e),
            }
        }
        info!(cycles = done, "Scheduler stopped");
        Ok(done)
    }

    /// Run at least `min_cycles`, then keep going while input is pending,
    /// up to `max_cycles` in total.
    pub fn run_until_idle(&self, min_cycles: u64, max_cycles: u64) -> Result<u64, NousError> {
        let mut done = 0;
        while done < max_cycles && (done < min_cycles || self.pending() > 0) {
            match self.cycle() {
                Ok(_) => done += 1,
                Err(NousError::Stopped) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    /// Clear memory, the pending queue and the task buffer together. Waits
    /// for a running cycle to finish. Removal listeners do not fire.
    pub fn reset(&self) {
        let _guard = lock(&self.cycle_lock);
        self.memory.reset();
        lock(&self.pending).clear();
        lock(&self.task_buffer).clear();
        info!("Scheduler reset");
    }
}
