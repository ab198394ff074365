use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::budget::{identity_hash, ActivationMode, Budget, Rank};
use crate::item::Item;

use super::{Bag, PutResult, Strategy};

/// Converts a budget into a firing delay measured in clock ticks.
///
/// `delay = 1 + round((max_delay - 1) * (1 - priority) * (1 - durability / 2))`
///
/// Higher priority and durability fire sooner; the delay is never below one
/// tick, so an item rescheduled at `now` is never due again in the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayCurve {
    pub max_delay: u64,
}

impl DelayCurve {
    pub fn new(max_delay: u64) -> Self {
        Self { max_delay }
    }

    pub fn delay(&self, budget: &Budget) -> u64 {
        let span = self.max_delay.saturating_sub(1) as f32;
        let slack = (1.0 - budget.priority()) * (1.0 - budget.durability() / 2.0);
        // Float-to-int casts saturate, so only the addition needs care.
        ((span * slack).round() as u64).saturating_add(1)
    }
}

impl Default for DelayCurve {
    fn default() -> Self {
        Self::new(8)
    }
}

struct DelaySlot<V> {
    item: V,
    rank: Rank,
    due: u64,
}

/// Bag whose selection order is driven by per-item due times.
///
/// Two indexes are kept alongside the item map: one by [`Rank`] for
/// eviction, one by `(due, sequence)` for selection. Only items whose due
/// time is at or before the bag's clock are eligible for selection.
pub struct DelayBag<V: Item> {
    capacity: usize,
    slots: HashMap<V::Key, DelaySlot<V>>,
    by_rank: BTreeMap<Rank, V::Key>,
    by_due: BTreeMap<(u64, u64), V::Key>,
    curve: DelayCurve,
    activation: ActivationMode,
    now: u64,
    sequence: u64,
}

impl<V: Item> DelayBag<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: HashMap::with_capacity(capacity),
            by_rank: BTreeMap::new(),
            by_due: BTreeMap::new(),
            curve: DelayCurve::default(),
            activation: ActivationMode::default(),
            now: 0,
            sequence: 0,
        }
    }

    pub fn with_curve(mut self, curve: DelayCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_activation(mut self, mode: ActivationMode) -> Self {
        self.activation = mode;
        self
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Earliest due time in the bag, elapsed or not.
    pub fn next_due(&self) -> Option<u64> {
        self.by_due.keys().next().map(|(due, _)| *due)
    }

    /// Due time of the item stored under `key`.
    pub fn due_of(&self, key: &V::Key) -> Option<u64> {
        self.slots.get(key).map(|s| s.due)
    }

    fn insert_at(&mut self, item: V, due: Option<u64>) {
        self.sequence += 1;
        let rank = Rank::new(item.budget(), identity_hash(item.key()), self.sequence);
        let fresh = self.now.saturating_add(self.curve.delay(item.budget()));
        let due = due.map_or(fresh, |d| d.min(fresh));
        let key = item.key().clone();
        self.by_rank.insert(rank, key.clone());
        self.by_due.insert((due, rank.sequence()), key.clone());
        self.slots.insert(key, DelaySlot { item, rank, due });
    }

    fn detach(&mut self, key: &V::Key) -> Option<(V, u64)> {
        let slot = self.slots.remove(key)?;
        if self.by_rank.remove(&slot.rank).is_none() {
            panic!("delay bag rank index lost key {key:?}");
        }
        let due_key = (slot.due, slot.rank.sequence());
        if self.by_due.remove(&due_key).is_none() {
            panic!("delay bag due index lost key {key:?}");
        }
        Some((slot.item, slot.due))
    }

    fn due_key(&self) -> Option<&V::Key> {
        self.by_due
            .iter()
            .next()
            .filter(|((due, _), _)| *due <= self.now)
            .map(|(_, key)| key)
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            self.check_invariants();
        }
    }
}

impl<V: Item> Bag<V> for DelayBag<V> {
    fn strategy(&self) -> Strategy {
        Strategy::Delay
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, key: &V::Key) -> Option<&V> {
        self.slots.get(key).map(|s| &s.item)
    }

    fn put(&mut self, item: V) -> PutResult<V> {
        if self.slots.contains_key(item.key()) {
            let key = item.key().clone();
            let incoming = *item.budget();
            let mode = self.activation;
            self.update(&key, &mut |existing| {
                existing.budget_mut().activate(&incoming, mode)
            });
            return PutResult::Merged;
        }
        if self.capacity == 0 {
            return PutResult::Rejected(item);
        }

        let result = if self.slots.len() < self.capacity {
            self.insert_at(item, None);
            PutResult::Inserted
        } else {
            let candidate = Rank::new(
                item.budget(),
                identity_hash(item.key()),
                self.sequence + 1,
            );
            let weakest = match self.by_rank.first_key_value() {
                Some((rank, key)) if candidate > *rank => key.clone(),
                _ => return PutResult::Rejected(item),
            };
            let evicted = match self.detach(&weakest) {
                Some((v, _)) => v,
                None => panic!("delay bag slot missing for {weakest:?}"),
            };
            self.insert_at(item, None);
            PutResult::Evicted(evicted)
        };

        assert!(
            self.slots.len() <= self.capacity,
            "delay bag over capacity: {} > {}",
            self.slots.len(),
            self.capacity
        );
        self.debug_check();
        result
    }

    /// Repositions the item; an update may pull its due time forward but
    /// never pushes it back.
    fn update(&mut self, key: &V::Key, f: &mut dyn FnMut(&mut V)) -> bool {
        let Some((mut item, due)) = self.detach(key) else {
            return false;
        };
        f(&mut item);
        debug_assert!(item.key() == key, "update changed the item key");
        self.insert_at(item, Some(due));
        self.debug_check();
        true
    }

    fn remove(&mut self, key: &V::Key) -> Option<V> {
        let removed = self.detach(key).map(|(v, _)| v);
        self.debug_check();
        removed
    }

    fn peek_next(&mut self) -> Option<&V> {
        let key = self.due_key()?;
        self.slots.get(key).map(|s| &s.item)
    }

    fn take_next(&mut self) -> Option<V> {
        let key = self.due_key()?.clone();
        let taken = self.detach(&key).map(|(v, _)| v);
        self.debug_check();
        taken
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.by_rank.clear();
        self.by_due.clear();
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        Box::new(
            self.by_due
                .values()
                .filter_map(move |k| self.slots.get(k).map(|s| &s.item)),
        )
    }

    fn min_rank(&self) -> Option<Rank> {
        self.by_rank.keys().next().copied()
    }

    fn set_time(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    fn check_invariants(&self) {
        assert!(
            self.slots.len() <= self.capacity,
            "delay bag over capacity: {} > {}",
            self.slots.len(),
            self.capacity
        );
        assert_eq!(
            self.by_rank.len(),
            self.slots.len(),
            "delay bag rank index and item map disagree"
        );
        assert_eq!(
            self.by_due.len(),
            self.slots.len(),
            "delay bag due index and item map disagree"
        );
        for (key, slot) in &self.slots {
            assert!(
                self.by_rank.get(&slot.rank) == Some(key),
                "delay bag rank index missing {key:?}"
            );
            assert!(
                self.by_due.get(&(slot.due, slot.rank.sequence())) == Some(key),
                "delay bag due index missing {key:?}"
            );
            assert!(
                slot.item.budget().is_valid(),
                "delay bag holds invalid budget for {key:?}"
            );
        }
    }
}
