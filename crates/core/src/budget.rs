//! The priority / durability / quality triple that orders and ages every
//! item held by a bag.
//!
//! - **priority**: immediate selection weight.
//! - **durability**: resistance to decay.
//! - **quality**: long-run value; scales the floor priority decays toward.
//!
//! Every field stays inside `[0, 1]`. Constructors and merge operators clamp,
//! so the only way to observe an out-of-range field is memory corruption,
//! which [`Budget::is_valid`] detects for the bag invariant checks.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Default activation threshold: items at or below this priority are dropped.
pub const DEFAULT_ACTIVATION_EPSILON: f32 = 0.01;

/// Default per-touch retention factor.
pub const DEFAULT_DECAY_RATE: f32 = 0.9;

fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// How an incoming budget is combined into an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// Keep the larger priority; ties keep the existing value.
    #[default]
    Max,
    /// Saturating probabilistic or: `1 - (1 - a)(1 - b)`.
    Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    priority: f32,
    durability: f32,
    quality: f32,
}

impl Budget {
    pub const ZERO: Budget = Budget {
        priority: 0.0,
        durability: 0.0,
        quality: 0.0,
    };

    /// Build a budget, clamping each field into `[0, 1]` (NaN becomes 0).
    pub fn new(priority: f32, durability: f32, quality: f32) -> Self {
        Self {
            priority: unit(priority),
            durability: unit(durability),
            quality: unit(quality),
        }
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn durability(&self) -> f32 {
        self.durability
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn set_priority(&mut self, priority: f32) {
        self.priority = unit(priority);
    }

    pub fn set_durability(&mut self, durability: f32) {
        self.durability = unit(durability);
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.quality = unit(quality);
    }

    /// Scale priority by `factor`, e.g. when deriving a weaker budget from
    /// a parent task.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.priority * factor, self.durability, self.quality)
    }

    /// All three fields are finite and inside `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        [self.priority, self.durability, self.quality]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// `priority > epsilon`.
    pub fn above_threshold(&self, epsilon: f32) -> bool {
        self.priority > epsilon
    }

    /// Merge new evidence into this budget.
    ///
    /// Priority follows `mode`; durability and quality become the
    /// priority-weighted average of both sides. When both priorities are
    /// zero the existing durability and quality are kept.
    pub fn activate(&mut self, incoming: &Budget, mode: ActivationMode) {
        let (p0, p1) = (self.priority, incoming.priority);
        let weight = p0 + p1;
        if weight > 0.0 {
            self.durability = unit((self.durability * p0 + incoming.durability * p1) / weight);
            self.quality = unit((self.quality * p0 + incoming.quality * p1) / weight);
        }
        self.priority = unit(match mode {
            ActivationMode::Max => {
                if p1 > p0 {
                    p1
                } else {
                    p0
                }
            }
            ActivationMode::Blend => 1.0 - (1.0 - p0) * (1.0 - p1),
        });
    }

    /// Copying variant of [`Budget::activate`].
    pub fn merged(mut self, incoming: &Budget, mode: ActivationMode) -> Self {
        self.activate(incoming, mode);
        self
    }

    /// Age the budget by one touch.
    ///
    /// The effective factor is `1 - (1 - rate) * (1 - durability)`, so a fully
    /// durable item does not decay at all. Priority floors at
    /// `quality * epsilon` but never rises: an item already below the floor
    /// keeps its priority.
    pub fn decay(&mut self, rate: f32, epsilon: f32) {
        let factor = 1.0 - (1.0 - unit(rate)) * (1.0 - self.durability);
        let floor = self.priority.min(self.quality * epsilon);
        self.priority = unit((self.priority * factor).max(floor));
    }

    /// Priority, then durability, then quality.
    pub fn cmp_rank(&self, other: &Budget) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.durability.total_cmp(&other.durability))
            .then_with(|| self.quality.total_cmp(&other.quality))
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.2};{:.2};{:.2}$",
            self.priority, self.durability, self.quality
        )
    }
}

/// Decay parameters applied each time a bag hands out an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forgetting {
    /// Retention factor in `[0, 1]`; 1.0 disables decay.
    pub rate: f32,
    /// Activation threshold; also scales the decay floor.
    pub epsilon: f32,
}

impl Forgetting {
    pub fn new(rate: f32, epsilon: f32) -> Self {
        Self { rate, epsilon }
    }

    /// Decay `budget` and report whether it is still above threshold.
    pub fn apply(&self, budget: &mut Budget) -> bool {
        budget.decay(self.rate, self.epsilon);
        budget.above_threshold(self.epsilon)
    }
}

impl Default for Forgetting {
    fn default() -> Self {
        Self::new(DEFAULT_DECAY_RATE, DEFAULT_ACTIVATION_EPSILON)
    }
}

/// Stable hash of an item key, used as the fourth ordering level.
///
/// `DefaultHasher::new()` uses fixed keys, so the value is reproducible
/// across runs of the same build.
pub fn identity_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Position of an item inside a bag's order index.
///
/// Ordered by budget (priority, durability, quality), then by the key's
/// identity hash, then by insertion sequence. The sequence keeps ranks unique
/// within one bag; among otherwise equal entries the older one ranks lower
/// and is evicted first.
#[derive(Debug, Clone, Copy)]
pub struct Rank {
    budget: Budget,
    identity: u64,
    sequence: u64,
}

impl Rank {
    pub fn new(budget: &Budget, identity: u64, sequence: u64) -> Self {
        Self {
            budget: *budget,
            identity,
            sequence,
        }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn priority(&self) -> f32 {
        self.budget.priority
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.budget
            .cmp_rank(&other.budget)
            .then_with(|| self.identity.cmp(&other.identity))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn new_clamps_fields() {
        let b = Budget::new(1.5, -0.2, f32::NAN);
        assert_eq!(b.priority(), 1.0);
        assert_eq!(b.durability(), 0.0);
        assert_eq!(b.quality(), 0.0);
        assert!(b.is_valid());
    }

    #[test]
    fn max_activation_keeps_higher_priority() {
        let mut existing = Budget::new(0.8, 0.5, 0.5);
        existing.activate(&Budget::new(0.3, 0.5, 0.5), ActivationMode::Max);
        assert!(approx(existing.priority(), 0.8));

        existing.activate(&Budget::new(0.9, 0.5, 0.5), ActivationMode::Max);
        assert!(approx(existing.priority(), 0.9));
    }

    #[test]
    fn weak_repeated_input_never_lowers_priority() {
        let mut b = Budget::new(0.7, 0.6, 0.4);
        for _ in 0..100 {
            b.activate(&Budget::new(0.05, 0.1, 0.1), ActivationMode::Max);
        }
        assert!(approx(b.priority(), 0.7));
    }

    #[test]
    fn blend_activation_saturates() {
        let mut b = Budget::new(0.5, 0.5, 0.5);
        b.activate(&Budget::new(0.5, 0.5, 0.5), ActivationMode::Blend);
        assert!(approx(b.priority(), 0.75));
        for _ in 0..50 {
            b.activate(&Budget::new(0.9, 0.5, 0.5), ActivationMode::Blend);
        }
        assert!(b.priority() <= 1.0);
    }

    #[test]
    fn activation_weights_durability_and_quality_by_priority() {
        let mut b = Budget::new(0.2, 0.0, 0.0);
        b.activate(&Budget::new(0.6, 1.0, 1.0), ActivationMode::Max);
        assert!(approx(b.durability(), 0.75));
        assert!(approx(b.quality(), 0.75));
    }

    #[test]
    fn activation_with_zero_priorities_keeps_existing() {
        let mut b = Budget::new(0.0, 0.3, 0.4);
        b.activate(&Budget::new(0.0, 0.9, 0.9), ActivationMode::Max);
        assert!(approx(b.durability(), 0.3));
        assert!(approx(b.quality(), 0.4));
    }

    #[test]
    fn decay_uses_durability_as_resistance() {
        let mut b = Budget::new(0.5, 0.5, 0.5);
        b.decay(0.9, 0.01);
        // factor = 1 - 0.1 * 0.5 = 0.95
        assert!(approx(b.priority(), 0.475));

        let mut evergreen = Budget::new(0.5, 1.0, 0.5);
        evergreen.decay(0.5, 0.01);
        assert!(approx(evergreen.priority(), 0.5));
    }

    #[test]
    fn decay_floors_at_quality_epsilon() {
        let mut b = Budget::new(0.5, 0.0, 1.0);
        for _ in 0..1000 {
            b.decay(0.5, 0.01);
        }
        assert!(approx(b.priority(), 0.01));
        assert!(!b.above_threshold(0.01));
    }

    #[test]
    fn decay_never_raises_priority_below_floor() {
        let mut b = Budget::new(0.001, 0.0, 1.0);
        b.decay(0.5, 0.01);
        assert!(approx(b.priority(), 0.001));
    }

    #[test]
    fn forgetting_reports_threshold() {
        let f = Forgetting::new(0.5, 0.1);
        let mut strong = Budget::new(0.9, 0.0, 0.0);
        assert!(f.apply(&mut strong));
        let mut weak = Budget::new(0.15, 0.0, 0.0);
        assert!(!f.apply(&mut weak));
    }

    #[test]
    fn cmp_rank_is_lexicographic() {
        let a = Budget::new(0.5, 0.2, 0.9);
        let b = Budget::new(0.5, 0.3, 0.1);
        let c = Budget::new(0.6, 0.0, 0.0);
        assert_eq!(a.cmp_rank(&b), Ordering::Less);
        assert_eq!(b.cmp_rank(&c), Ordering::Less);
        assert_eq!(a.cmp_rank(&a), Ordering::Equal);
    }

    #[test]
    fn rank_ties_resolve_by_identity_then_sequence() {
        let b = Budget::new(0.5, 0.5, 0.5);
        let older = Rank::new(&b, 7, 1);
        let newer = Rank::new(&b, 7, 2);
        let other = Rank::new(&b, 8, 0);
        assert!(older < newer);
        assert!(newer < other);
    }

    #[test]
    fn identity_hash_is_stable() {
        assert_eq!(identity_hash("cat"), identity_hash("cat"));
        assert_ne!(identity_hash("cat"), identity_hash("dog"));
    }

    #[test]
    fn display_format() {
        assert_eq!(Budget::new(0.5, 0.8, 0.95).to_string(), "$0.50;0.80;0.95$");
    }
}
