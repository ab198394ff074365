use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FiringPolicy;
use crate::memory::MemoryStats;

/// Scheduler operational metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    /// Active firing policy.
    pub policy: FiringPolicy,
    /// Completed cycles.
    pub cycles: u64,
    /// Tasks accepted into the pending queue (input and derived).
    pub inputs_accepted: u64,
    /// Tasks dropped for being at or below the activation threshold.
    pub inputs_dropped: u64,
    /// Tasks shed by a full pending queue or task buffer.
    pub inputs_shed: u64,
    /// Tasks handed to direct processing.
    pub tasks_processed: u64,
    /// Indirect premise combinations handed to the processor.
    pub indirect_premises: u64,
    pub concepts_fired: u64,
    /// Concepts selected but skipped (fire count below one or no task-links).
    pub concepts_skipped: u64,
    /// Processor calls that returned an error or panicked.
    pub processor_failures: u64,
    pub derived_tasks: u64,
    /// Pending queue depth after the last cycle.
    pub pending: usize,
    /// Concept bag occupancy after the last cycle.
    pub concepts: usize,
    pub avg_cycle_duration: Duration,
    pub last_cycle: Option<DateTime<Utc>>,
    pub memory: MemoryStats,
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self {
            policy: FiringPolicy::default(),
            cycles: 0,
            inputs_accepted: 0,
            inputs_dropped: 0,
            inputs_shed: 0,
            tasks_processed: 0,
            indirect_premises: 0,
            concepts_fired: 0,
            concepts_skipped: 0,
            processor_failures: 0,
            derived_tasks: 0,
            pending: 0,
            concepts: 0,
            avg_cycle_duration: Duration::ZERO,
            last_cycle: None,
            memory: MemoryStats::default(),
        }
    }
}

impl SchedulerMetrics {
    pub fn new(policy: FiringPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Record a completed cycle.
    pub fn record_cycle(&mut self, duration: Duration) {
        self.cycles += 1;
        self.last_cycle = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_cycle_duration = if self.cycles == 1 {
            duration
        } else {
            let prev_nanos = self.avg_cycle_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.cycles as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_cycle() {
        let mut m = SchedulerMetrics::default();
        m.record_cycle(Duration::from_millis(100));

        assert_eq!(m.cycles, 1);
        assert!(m.last_cycle.is_some());
        assert_eq!(m.avg_cycle_duration, Duration::from_millis(100));
    }

    #[test]
    fn record_multiple_cycles_averages() {
        let mut m = SchedulerMetrics::default();
        m.record_cycle(Duration::from_millis(100));
        m.record_cycle(Duration::from_millis(200));

        assert_eq!(m.cycles, 2);
        // Average of 100ms and 200ms = 150ms
        let avg = m.avg_cycle_duration.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn serializes_to_json() {
        let m = SchedulerMetrics::new(FiringPolicy::Continuous);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["policy"], "continuous");
        assert_eq!(json["cycles"], 0);
        assert!(json["last_cycle"].is_null());
    }
}
