//! Bounded sorted buffer for tasks awaiting admission.
//!
//! Unlike a [`Bag`](crate::bag::Bag) there is no probabilistic selection:
//! callers pop strictly from the top. When full, an incoming item is compared
//! once against the current minimum; it either displaces that minimum or is
//! rejected. Equal ranks fall back to the [`Rank`] tie-breaks, so among
//! identical budgets the oldest entry is shed first.

use std::collections::{BTreeMap, HashMap};

use crate::bag::PutResult;
use crate::budget::{identity_hash, ActivationMode, Rank};
use crate::item::Item;

pub struct TaskQueue<V: Item> {
    capacity: usize,
    entries: BTreeMap<Rank, V>,
    ranks: HashMap<V::Key, Rank>,
    activation: ActivationMode,
    sequence: u64,
}

impl<V: Item> TaskQueue<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            ranks: HashMap::new(),
            activation: ActivationMode::default(),
            sequence: 0,
        }
    }

    pub fn with_activation(mut self, mode: ActivationMode) -> Self {
        self.activation = mode;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &V::Key) -> bool {
        self.ranks.contains_key(key)
    }

    pub fn push(&mut self, item: V) -> PutResult<V> {
        if let Some(rank) = self.ranks.remove(item.key()) {
            let mut existing = match self.entries.remove(&rank) {
                Some(v) => v,
                None => panic!("task queue rank index lost {:?}", item.key()),
            };
            let incoming = *item.budget();
            existing.budget_mut().activate(&incoming, self.activation);
            self.insert(existing);
            return PutResult::Merged;
        }
        if self.capacity == 0 {
            return PutResult::Rejected(item);
        }
        if self.entries.len() < self.capacity {
            self.insert(item);
            return PutResult::Inserted;
        }

        let candidate = Rank::new(item.budget(), identity_hash(item.key()), self.sequence + 1);
        match self.entries.first_key_value() {
            Some((lowest, _)) if candidate > *lowest => {}
            _ => return PutResult::Rejected(item),
        }
        let evicted = match self.entries.pop_first() {
            Some((_, v)) => v,
            None => return PutResult::Rejected(item),
        };
        self.ranks.remove(evicted.key());
        self.insert(item);
        assert!(
            self.entries.len() <= self.capacity,
            "task queue over capacity: {} > {}",
            self.entries.len(),
            self.capacity
        );
        PutResult::Evicted(evicted)
    }

    pub fn pop_highest(&mut self) -> Option<V> {
        let (_, item) = self.entries.pop_last()?;
        self.ranks.remove(item.key());
        Some(item)
    }

    pub fn pop_lowest(&mut self) -> Option<V> {
        let (_, item) = self.entries.pop_first()?;
        self.ranks.remove(item.key());
        Some(item)
    }

    /// Pop up to `limit` items, highest first.
    pub fn drain_descending(&mut self, limit: usize) -> Vec<V> {
        let mut out = Vec::with_capacity(limit.min(self.entries.len()));
        while out.len() < limit {
            match self.pop_highest() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    pub fn highest(&self) -> Option<&V> {
        self.entries.last_key_value().map(|(_, v)| v)
    }

    pub fn lowest(&self) -> Option<&V> {
        self.entries.first_key_value().map(|(_, v)| v)
    }

    /// Highest first.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.values().rev()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.ranks.clear();
    }

    fn insert(&mut self, item: V) {
        self.sequence += 1;
        let rank = Rank::new(item.budget(), identity_hash(item.key()), self.sequence);
        self.ranks.insert(item.key().clone(), rank);
        self.entries.insert(rank, item);
    }
}
