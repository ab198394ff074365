use nous_core::{ActivationMode, Strategy, DEFAULT_ACTIVATION_EPSILON, DEFAULT_DECAY_RATE};
use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_fire_delay`, in cycles.
pub const MAX_FIRE_DELAY_LIMIT: u64 = 1 << 20;

/// Which firing policy drives the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiringPolicy {
    /// Curve-selected concept bag, bounded task buffer, exhaustive scan of
    /// every concept once per cycle.
    #[default]
    Batch,
    /// Delay-scheduled concept bag; a concept fires when its due time
    /// elapses.
    Continuous,
}

impl FiringPolicy {
    /// Bag strategy the concept bag uses under this policy.
    pub fn strategy(self) -> Strategy {
        match self {
            FiringPolicy::Batch => Strategy::Curve,
            FiringPolicy::Continuous => Strategy::Delay,
        }
    }
}

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concept bag capacity.
    #[serde(default = "default_max_concepts")]
    pub max_concepts: usize,
    /// Sub-concept cache capacity. Unset means 4 x `max_concepts`.
    #[serde(default)]
    pub max_sub_concepts: Option<usize>,
    /// Pending tasks moved into processing per batch cycle.
    #[serde(default = "default_inputs_per_cycle")]
    pub inputs_per_cycle: usize,
    /// Pending input queue capacity.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    #[serde(default)]
    pub min_task_link: usize,
    #[serde(default = "default_max_task_link")]
    pub max_task_link: usize,
    #[serde(default)]
    pub min_term_link: usize,
    #[serde(default = "default_max_term_link")]
    pub max_term_link: usize,
    /// Per-concept task-link bag capacity.
    #[serde(default = "default_link_capacity")]
    pub task_link_capacity: usize,
    /// Per-concept term-link bag capacity.
    #[serde(default = "default_link_capacity")]
    pub term_link_capacity: usize,
    /// Items at or below this priority are dropped.
    #[serde(default = "default_activation_epsilon")]
    pub activation_epsilon: f32,
    /// Concept retention factor per firing (1.0 = no decay).
    #[serde(default = "default_decay_rate")]
    pub priority_decay_rate: f32,
    /// Link retention factor per draw.
    #[serde(default = "default_decay_rate")]
    pub link_decay_rate: f32,
    #[serde(default)]
    pub activation_mode: ActivationMode,
    #[serde(default)]
    pub policy: FiringPolicy,
    /// Exponent of the curve-bag selection curve.
    #[serde(default = "default_selection_exponent")]
    pub selection_exponent: f32,
    /// Longest delay, in cycles, the continuous policy assigns a concept.
    #[serde(default = "default_max_fire_delay")]
    pub max_fire_delay: u64,
    /// Fire due concepts on a worker pool (continuous policy only).
    #[serde(default)]
    pub parallel_firing: bool,
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    /// Seed for every selection RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_max_concepts() -> usize {
    1000
}

fn default_inputs_per_cycle() -> usize {
    1
}

fn default_max_pending() -> usize {
    4096
}

fn default_max_task_link() -> usize {
    9
}

fn default_max_term_link() -> usize {
    3
}

fn default_link_capacity() -> usize {
    64
}

fn default_activation_epsilon() -> f32 {
    DEFAULT_ACTIVATION_EPSILON
}

fn default_decay_rate() -> f32 {
    DEFAULT_DECAY_RATE
}

fn default_selection_exponent() -> f32 {
    2.0
}

fn default_max_fire_delay() -> u64 {
    8
}

fn default_seed() -> u64 {
    0x5eed
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concepts: default_max_concepts(),
            max_sub_concepts: None,
            inputs_per_cycle: default_inputs_per_cycle(),
            max_pending: default_max_pending(),
            min_task_link: 0,
            max_task_link: default_max_task_link(),
            min_term_link: 0,
            max_term_link: default_max_term_link(),
            task_link_capacity: default_link_capacity(),
            term_link_capacity: default_link_capacity(),
            activation_epsilon: default_activation_epsilon(),
            priority_decay_rate: default_decay_rate(),
            link_decay_rate: default_decay_rate(),
            activation_mode: ActivationMode::default(),
            policy: FiringPolicy::default(),
            selection_exponent: default_selection_exponent(),
            max_fire_delay: default_max_fire_delay(),
            parallel_firing: false,
            worker_threads: 0,
            seed: default_seed(),
        }
    }
}

impl SchedulerConfig {
    /// Sub-concept cache capacity, defaulting to four times the concept bag.
    pub fn resolved_sub_concepts(&self) -> usize {
        self.max_sub_concepts
            .unwrap_or_else(|| self.max_concepts.saturating_mul(4))
    }

    /// Capacity of the batch policy's task buffer:
    /// `max_concepts x max_task_link x max_term_link x 2`.
    pub fn task_buffer_capacity(&self) -> usize {
        self.max_concepts
            .saturating_mul(self.max_task_link)
            .saturating_mul(self.max_term_link)
            .saturating_mul(2)
            .max(1)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}
