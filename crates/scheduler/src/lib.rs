//! Resource-bounded attention scheduler.
//!
//! Each cycle admits pending tasks, fires concepts selected from a bounded
//! concept bag and hands premises to an external [`PremiseProcessor`].
//! Concepts pushed out of the bag are parked in a sub-concept cache for
//! cheap reinstatement.

pub mod concept;
pub mod config;
pub mod memory;
pub mod metrics;
pub mod processor;
pub mod scheduler;
pub mod task;
pub mod term;

pub use concept::{Concept, ConceptBuilder, ConceptLinks, LinkSettings, StandardConceptBuilder};
pub use config::{FiringPolicy, SchedulerConfig, MAX_FIRE_DELAY_LIMIT};
pub use memory::{Memory, MemoryStats, RemovalHook, RemovalReason};
pub use metrics::SchedulerMetrics;
pub use processor::{NullProcessor, PremiseProcessor, ProcessError};
pub use scheduler::{Admission, CycleReport, Scheduler, SchedulerState};
pub use task::{Stamp, Task, TaskLink, TermLink};
pub use term::Term;
