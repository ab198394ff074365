//! Per-cycle attention scheduler.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor and accessor methods
//! - `admission`: input queueing and per-cycle admission of pending tasks
//! - `firing`: concept selection, link draws and guarded processor calls
//! - `cycle`: the cycle state machine and the run loops

mod admission;
mod core;
mod cycle;
mod firing;

pub use self::admission::Admission;
pub use self::core::{Scheduler, SchedulerState};
pub use self::cycle::CycleReport;
