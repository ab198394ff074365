use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use nous_core::{Budget, NousError, TaskQueue};
use tracing::info;

use crate::concept::{Concept, ConceptBuilder, StandardConceptBuilder};
use crate::config::{FiringPolicy, SchedulerConfig};
use crate::memory::{lock, Memory, RemovalReason};
use crate::metrics::SchedulerMetrics;
use crate::processor::PremiseProcessor;
use crate::task::Task;
use crate::term::Term;

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    CycleRunning,
    /// Terminal; entered only through [`Scheduler::shutdown`].
    Stopped,
}

impl SchedulerState {
    pub(super) fn as_u8(self) -> u8 {
        match self {
            SchedulerState::Idle => 0,
            SchedulerState::CycleRunning => 1,
            SchedulerState::Stopped => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => SchedulerState::Idle,
            1 => SchedulerState::CycleRunning,
            _ => SchedulerState::Stopped,
        }
    }
}

/// The attention scheduler. Owns the pending input queue and drives
/// admission and concept firing against a shared [`Memory`].
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    /// Concept bag, sub-concept cache and lifecycle glue.
    pub(super) memory: Arc<Memory>,
    pub(super) processor: Arc<dyn PremiseProcessor>,
    /// Tasks waiting for admission, highest rank first.
    pub(super) pending: Mutex<TaskQueue<Task>>,
    /// Batch policy staging buffer, drained completely every cycle.
    pub(super) task_buffer: Mutex<TaskQueue<Task>>,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
    /// Held for the whole of a cycle so cycles never overlap.
    pub(super) cycle_lock: Mutex<()>,
    pub(super) state: AtomicU8,
    /// Shutdown signal.
    pub(super) shutdown: Arc<AtomicBool>,
    /// Worker pool for parallel wave firing.
    pub(super) pool: Option<rayon::ThreadPool>,
}

impl Scheduler {
    /// Create a scheduler. The config is validated first; a worker pool is
    /// built only for the continuous policy with parallel firing enabled.
    pub fn new(
        config: SchedulerConfig,
        processor: Arc<dyn PremiseProcessor>,
        builder: Arc<dyn ConceptBuilder>,
    ) -> Result<Self, NousError> {
        config.validate()?;

        let pool = if config.policy == FiringPolicy::Continuous && config.parallel_firing {
            let threads = config.resolved_worker_threads();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("nous-fire-{i}"))
                .build()
                .map_err(|e| NousError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        info!(
            policy = ?config.policy,
            max_concepts = config.max_concepts,
            sub_concepts = config.resolved_sub_concepts(),
            workers = pool.as_ref().map_or(0, |p| p.current_num_threads()),
            "Scheduler created"
        );

        Ok(Self {
            memory: Arc::new(Memory::new(&config, builder)),
            processor,
            pending: Mutex::new(
                TaskQueue::new(config.max_pending).with_activation(config.activation_mode),
            ),
            task_buffer: Mutex::new(
                TaskQueue::new(config.task_buffer_capacity())
                    .with_activation(config.activation_mode),
            ),
            metrics: Arc::new(RwLock::new(SchedulerMetrics::new(config.policy))),
            cycle_lock: Mutex::new(()),
            state: AtomicU8::new(SchedulerState::Idle.as_u8()),
            shutdown: Arc::new(AtomicBool::new(false)),
            pool,
            config,
        })
    }

    /// Create a scheduler that builds concepts with [`StandardConceptBuilder`].
    pub fn standard(
        config: SchedulerConfig,
        processor: Arc<dyn PremiseProcessor>,
    ) -> Result<Self, NousError> {
        Self::new(config, processor, Arc::new(StandardConceptBuilder))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn policy(&self) -> FiringPolicy {
        self.config.policy
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get a handle to the shared memory.
    pub fn memory(&self) -> Arc<Memory> {
        Arc::clone(&self.memory)
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut m = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        m.memory = self.memory.stats();
        m.pending = self.pending();
        m.concepts = self.memory.size();
        m
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<SchedulerMetrics>> {
        Arc::clone(&self.metrics)
    }

    // ── Memory pass-throughs ────────────────────────────────────────

    pub fn concept_count(&self) -> usize {
        self.memory.size()
    }

    pub fn concept(&self, term: &Term) -> Option<Concept> {
        self.memory.concept(term)
    }

    pub fn conceptualize(
        &self,
        term: &Term,
        budget: Budget,
        create_if_missing: bool,
    ) -> Option<Concept> {
        self.memory.conceptualize(term, budget, create_if_missing)
    }

    /// Snapshot of the resident concepts; safe while cycles run.
    pub fn concepts(&self) -> Vec<Concept> {
        self.memory.concepts()
    }

    pub fn on_concept_removed(
        &self,
        hook: impl Fn(&Concept, RemovalReason) + Send + Sync + 'static,
    ) {
        self.memory.on_concept_removed(hook);
    }

    // ── Pending queue ───────────────────────────────────────────────

    /// Pending input queue depth.
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Copy of the pending tasks, highest rank first.
    pub fn pending_tasks(&self) -> Vec<Task> {
        lock(&self.pending).iter().cloned().collect()
    }

    // ── Shutdown ────────────────────────────────────────────────────

    /// Signal the scheduler to stop. Any running cycle completes; later
    /// cycles are refused.
    pub fn shutdown(&self) {
        info!("Scheduler shutdown requested");
        self.shutdown.store(true, Ordering::Release);
        self.state
            .store(SchedulerState::Stopped.as_u8(), Ordering::Release);
    }

    /// Get an Arc to the shutdown flag (for external shutdown signaling).
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub(super) fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(super) fn with_metrics(&self, f: impl FnOnce(&mut SchedulerMetrics)) {
        let mut m = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut m);
    }
}
