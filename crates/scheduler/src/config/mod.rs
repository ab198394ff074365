//! Scheduler configuration.
//!
//! Split into focused submodules:
//! - `types`: the config struct, firing policy and serde defaults
//! - `loading`: TOML parsing, file loading and environment overrides
//! - `validation`: range and consistency checks

mod loading;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use types::{FiringPolicy, SchedulerConfig, MAX_FIRE_DELAY_LIMIT};
