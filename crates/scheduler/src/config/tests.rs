use nous_core::{ActivationMode, Strategy};

use super::types::{FiringPolicy, SchedulerConfig, MAX_FIRE_DELAY_LIMIT};

#[test]
fn empty_toml_yields_defaults() {
    let cfg: SchedulerConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.max_concepts, 1000);
    assert_eq!(cfg.inputs_per_cycle, 1);
    assert_eq!(cfg.max_task_link, 9);
    assert_eq!(cfg.max_term_link, 3);
    assert_eq!(cfg.policy, FiringPolicy::Batch);
    assert_eq!(cfg.activation_mode, ActivationMode::Max);
    assert!(cfg.validate().is_ok());
}

#[test]
fn parse_full_toml() {
    let toml = r#"
max_concepts = 50
max_sub_concepts = 120
min_task_link = 1
max_task_link = 5
min_term_link = 1
max_term_link = 2
activation_epsilon = 0.05
priority_decay_rate = 0.8
activation_mode = "blend"
policy = "continuous"
max_fire_delay = 12
parallel_firing = true
worker_threads = 2
"#;
    let cfg = SchedulerConfig::from_toml(toml).unwrap();
    assert_eq!(cfg.max_concepts, 50);
    assert_eq!(cfg.resolved_sub_concepts(), 120);
    assert_eq!(cfg.min_task_link, 1);
    assert_eq!(cfg.activation_mode, ActivationMode::Blend);
    assert_eq!(cfg.policy, FiringPolicy::Continuous);
    assert_eq!(cfg.policy.strategy(), Strategy::Delay);
    assert_eq!(cfg.max_fire_delay, 12);
    assert!(cfg.parallel_firing);
    assert_eq!(cfg.resolved_worker_threads(), 2);
}

#[test]
fn derived_capacities() {
    let cfg = SchedulerConfig {
        max_concepts: 10,
        ..SchedulerConfig::default()
    };
    assert_eq!(cfg.resolved_sub_concepts(), 40);
    assert_eq!(cfg.task_buffer_capacity(), 10 * 9 * 3 * 2);

    let degenerate = SchedulerConfig {
        max_term_link: 0,
        ..SchedulerConfig::default()
    };
    assert_eq!(degenerate.task_buffer_capacity(), 1);
}

#[test]
fn reject_min_above_max() {
    let toml = "min_task_link = 4\nmax_task_link = 2\n";
    let err = SchedulerConfig::from_toml(toml).unwrap_err();
    assert!(err.to_string().contains("min_task_link"));
}

#[test]
fn reject_out_of_range_epsilon() {
    let toml = "activation_epsilon = 1.5\n";
    let err = SchedulerConfig::from_toml(toml).unwrap_err();
    assert!(err.to_string().contains("activation_epsilon"));
}

#[test]
fn reject_zero_capacity() {
    let toml = "max_concepts = 0\n";
    let err = SchedulerConfig::from_toml(toml).unwrap_err();
    assert!(err.to_string().contains("max_concepts"));
}

#[test]
fn max_fire_delay_is_bounded() {
    let with_delay = |max_fire_delay| SchedulerConfig {
        max_fire_delay,
        ..SchedulerConfig::default()
    };
    assert!(with_delay(MAX_FIRE_DELAY_LIMIT).validate().is_ok());
    assert!(with_delay(1).validate().is_ok());
    for bad in [0, MAX_FIRE_DELAY_LIMIT + 1, u64::MAX] {
        let err = with_delay(bad).validate().unwrap_err();
        assert!(err.to_string().contains("max_fire_delay"), "got: {err}");
    }
}

#[test]
fn reject_unknown_policy() {
    let err = SchedulerConfig::from_toml("policy = \"random\"\n").unwrap_err();
    assert!(err.to_string().contains("parse"), "got: {err}");
}

#[test]
fn resolved_worker_threads_auto() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.resolved_worker_threads() >= 1);
}

#[test]
fn env_override_seed() {
    // SAFETY: test-only, no other test in this binary reads NOUS_SEED
    unsafe {
        std::env::set_var("NOUS_SEED", "99");
    }
    let cfg = SchedulerConfig::from_toml("seed = 1\n").unwrap();
    assert_eq!(cfg.seed, 99);
    unsafe {
        std::env::remove_var("NOUS_SEED");
    }
}

#[test]
fn continuous_preset() {
    let cfg = SchedulerConfig::continuous();
    assert_eq!(cfg.policy, FiringPolicy::Continuous);
    assert_eq!(cfg.max_concepts, SchedulerConfig::default().max_concepts);
}
