use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::budget::{identity_hash, ActivationMode, Rank};
use crate::item::Item;

use super::{Bag, PutResult, Strategy};

/// Maps a uniform sample to a position counted from the top of the order.
///
/// `x = r^exponent`, position `floor(x * len)`. Exponents above 1 bias
/// towards the top; every position keeps a non-zero probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionCurve {
    pub exponent: f32,
}

impl SelectionCurve {
    pub fn new(exponent: f32) -> Self {
        Self { exponent }
    }

    /// Position from the top for sample `r` in `[0, 1)`. `len` must be > 0.
    pub fn pick(&self, r: f32, len: usize) -> usize {
        let x = r.clamp(0.0, 1.0).powf(self.exponent.max(f32::MIN_POSITIVE));
        ((x * len as f32) as usize).min(len - 1)
    }
}

impl Default for SelectionCurve {
    fn default() -> Self {
        Self::new(2.0)
    }
}

struct Slot<V> {
    item: V,
    rank: Rank,
}

/// Bag backed by a dense array sorted by [`Rank`], lowest first.
///
/// Positioning is a binary search plus an O(n) shift; lookups go through a
/// key map. Selection draws from a seeded RNG so identical inputs produce
/// identical selections.
pub struct CurveBag<V: Item> {
    capacity: usize,
    slots: HashMap<V::Key, Slot<V>>,
    order: Vec<(Rank, V::Key)>,
    curve: SelectionCurve,
    activation: ActivationMode,
    rng: StdRng,
    sequence: u64,
}

impl<V: Item> CurveBag<V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_seed(capacity, 0)
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self {
            capacity,
            slots: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            curve: SelectionCurve::default(),
            activation: ActivationMode::default(),
            rng: StdRng::seed_from_u64(seed),
            sequence: 0,
        }
    }

    pub fn with_curve(mut self, curve: SelectionCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_activation(mut self, mode: ActivationMode) -> Self {
        self.activation = mode;
        self
    }

    /// Highest ranked item.
    pub fn highest(&self) -> Option<&V> {
        self.order.last().and_then(|(_, k)| self.item(k))
    }

    /// Lowest ranked item, i.e. the next eviction candidate.
    pub fn lowest(&self) -> Option<&V> {
        self.order.first().and_then(|(_, k)| self.item(k))
    }

    pub fn iter_ascending(&self) -> impl Iterator<Item = &V> + '_ {
        self.order.iter().filter_map(move |(_, k)| self.item(k))
    }

    fn item(&self, key: &V::Key) -> Option<&V> {
        self.slots.get(key).map(|s| &s.item)
    }

    fn rank_for(&self, item: &V, sequence: u64) -> Rank {
        Rank::new(item.budget(), identity_hash(item.key()), sequence)
    }

    fn position(&self, rank: &Rank) -> Result<usize, usize> {
        self.order.binary_search_by(|(r, _)| r.cmp(rank))
    }

    fn insert_ranked(&mut self, item: V) {
        self.sequence += 1;
        let rank = self.rank_for(&item, self.sequence);
        let pos = match self.position(&rank) {
            Ok(p) | Err(p) => p,
        };
        let key = item.key().clone();
        self.order.insert(pos, (rank, key.clone()));
        self.slots.insert(key, Slot { item, rank });
    }

    fn detach(&mut self, key: &V::Key) -> Option<V> {
        let slot = self.slots.remove(key)?;
        match self.position(&slot.rank) {
            Ok(pos) => {
                self.order.remove(pos);
            }
            Err(_) => panic!("curve bag order index lost key {key:?}"),
        }
        Some(slot.item)
    }

    fn select_index(&mut self) -> Option<usize> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }
        let r: f32 = self.rng.gen();
        Some(len - 1 - self.curve.pick(r, len))
    }

    fn debug_check(&self) {
        if cfg!(debug_assertions) {
            self.check_invariants();
        }
    }
}

impl<V: Item> Bag<V> for CurveBag<V> {
    fn strategy(&self) -> Strategy {
        Strategy::Curve
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn get(&self, key: &V::Key) -> Option<&V> {
        self.item(key)
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

        let result = if self.order.len() < self.capacity {
            self.insert_ranked(item);
            PutResult::Inserted
        } else {
            let candidate = self.rank_for(&item, self.sequence + 1);
            if let Some((weakest, _)) = self.order.first() {
                if candidate < *weakest {
                    return PutResult::Rejected(item);
                }
            }
            let (_, weakest_key) = self.order.remove(0);
            let evicted = match self.slots.remove(&weakest_key) {
                Some(slot) => slot.item,
                None => panic!("curve bag slot missing for {weakest_key:?}"),
            };
            self.insert_ranked(item);
            PutResult::Evicted(evicted)
        };

        assert!(
            self.order.len() <= self.capacity,
            "curve bag over capacity: {} > {}",
            self.order.len(),
            self.capacity
        );
        self.debug_check();
        result
    }

    fn update(&mut self, key: &V::Key, f: &mut dyn FnMut(&mut V)) -> bool {
        let Some(mut item) = self.detach(key) else {
            return false;
        };
        f(&mut item);
        debug_assert!(item.key() == key, "update changed the item key");
        self.insert_ranked(item);
        self.debug_check();
        true
    }

    fn remove(&mut self, key: &V::Key) -> Option<V> {
        let removed = self.detach(key);
        self.debug_check();
        removed
    }

    fn peek_next(&mut self) -> Option<&V> {
        let idx = self.select_index()?;
        let key = &self.order[idx].1;
        self.slots.get(key).map(|s| &s.item)
    }

    fn take_next(&mut self) -> Option<V> {
        let idx = self.select_index()?;
        let (_, key) = self.order.remove(idx);
        let taken = self.slots.remove(&key).map(|s| s.item);
        self.debug_check();
        taken
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_> {
        let descending = self.order.iter().rev();
        Box::new(descending.filter_map(move |(_, k)| self.item(k)))
    }

    fn min_rank(&self) -> Option<Rank> {
        self.order.first().map(|(r, _)| *r)
    }

    fn check_invariants(&self) {
        assert!(
            self.order.len() <= self.capacity,
            "curve bag over capacity: {} > {}",
            self.order.len(),
            self.capacity
        );
        assert_eq!(
            self.order.len(),
            self.slots.len(),
            "curve bag order index and item map disagree"
        );
        assert!(
            self.order.windows(2).all(|w| w[0].0 < w[1].0),
            "curve bag order index not strictly ascending"
        );
        for (rank, key) in &self.order {
            let Some(slot) = self.slots.get(key) else {
                panic!("curve bag order index holds unknown key {key:?}");
            };
            assert!(slot.rank == *rank, "curve bag rank mismatch for {key:?}");
            assert!(
                slot.item.budget().is_valid(),
                "curve bag holds invalid budget for {key:?}"
            );
        }
    }
}
