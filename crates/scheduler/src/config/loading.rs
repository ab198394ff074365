use std::path::Path;

use nous_core::NousError;

use super::types::{FiringPolicy, SchedulerConfig};

impl SchedulerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, NousError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NousError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Config for the continuous policy, otherwise default.
    pub fn continuous() -> Self {
        Self {
            policy: FiringPolicy::Continuous,
            ..Self::default()
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `NOUS_KEY` overrides `key`.
    /// - `NOUS_MAX_CONCEPTS` -> `max_concepts`
    /// - `NOUS_INPUTS_PER_CYCLE` -> `inputs_per_cycle`
    /// - `NOUS_POLICY` -> `policy` (`batch` | `continuous`)
    /// - `NOUS_SEED` -> `seed`
    /// - `NOUS_WORKER_THREADS` -> `worker_threads`
    /// - `NOUS_PARALLEL_FIRING` -> `parallel_firing`
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), NousError> {
        if let Some(v) = env_parse("NOUS_MAX_CONCEPTS")? {
            self.max_concepts = v;
        }
        if let Some(v) = env_parse("NOUS_INPUTS_PER_CYCLE")? {
            self.inputs_per_cycle = v;
        }
        if let Ok(v) = std::env::var("NOUS_POLICY") {
            self.policy = match v.to_ascii_lowercase().as_str() {
                "batch" => FiringPolicy::Batch,
                "continuous" => FiringPolicy::Continuous,
                other => {
                    return Err(NousError::Config(format!(
                        "NOUS_POLICY: unknown policy '{other}', expected 'batch' or 'continuous'"
                    )))
                }
            };
        }
        if let Some(v) = env_parse("NOUS_SEED")? {
            self.seed = v;
        }
        if let Some(v) = env_parse("NOUS_WORKER_THREADS")? {
            self.worker_threads = v;
        }
        if let Some(v) = env_parse("NOUS_PARALLEL_FIRING")? {
            self.parallel_firing = v;
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, NousError> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NousError::Config(format!("{name}: cannot parse '{v}'"))),
        Err(_) => Ok(None),
    }
}
