//! Overflow tier for items pushed out of a primary bag.
//!
//! Evicted concepts land here instead of being destroyed, so a later
//! reconceptualization can reinstate them with their budget and links
//! intact. The cache obeys the ordinary bag contract: once full, the lower
//! ranked of (incoming, current minimum) is destroyed.

use crate::bag::{Bag, CurveBag, PutResult};
use crate::budget::ActivationMode;
use crate::item::Item;

pub struct SubConceptCache<V: Item> {
    bag: CurveBag<V>,
}

impl<V: Item> SubConceptCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            bag: CurveBag::new(capacity),
        }
    }

    pub fn with_activation(mut self, mode: ActivationMode) -> Self {
        self.bag = self.bag.with_activation(mode);
        self
    }

    /// Store `item`. Returns the item destroyed to keep the cache bounded,
    /// which is either the displaced minimum or `item` itself.
    pub fn insert(&mut self, item: V) -> Option<V> {
        match self.bag.put(item) {
            PutResult::Inserted | PutResult::Merged => None,
            PutResult::Evicted(destroyed) | PutResult::Rejected(destroyed) => Some(destroyed),
        }
    }

    /// Remove an item for reinstatement into the primary bag.
    pub fn take(&mut self, key: &V::Key) -> Option<V> {
        self.bag.remove(key)
    }

    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.bag.get(key)
    }

    pub fn contains(&self, key: &V::Key) -> bool {
        self.bag.contains(key)
    }

    pub fn len(&self) -> usize {
        self.bag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bag.len() >= self.bag.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.bag.capacity()
    }

    pub fn clear(&mut self) {
        self.bag.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.bag.iter()
    }

    pub fn check_invariants(&self) {
        self.bag.check_invariants();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use crate::item::Entry;

    fn entry(key: &'static str, priority: f32) -> Entry<&'static str> {
        Entry::new(key, Budget::new(priority, 0.5, 0.5))
    }

    #[test]
    fn stores_and_reinstates() {
        let mut cache = SubConceptCache::new(4);
        assert!(cache.insert(entry("a", 0.4)).is_none());
        assert!(cache.contains(&"a"));

        let back = cache.take(&"a").unwrap();
        assert_eq!(back.budget.priority(), 0.4);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_destroys_lowest() {
        let mut cache = SubConceptCache::new(2);
        cache.insert(entry("a", 0.3));
        cache.insert(entry("b", 0.6));
        assert!(cache.is_full());

        let destroyed = cache.insert(entry("c", 0.9)).unwrap();
        assert_eq!(destroyed.key, "a");

        let destroyed = cache.insert(entry("d", 0.1)).unwrap();
        assert_eq!(destroyed.key, "d");
        assert_eq!(cache.len(), 2);
        cache.check_invariants();
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = SubConceptCache::new(2);
        cache.insert(entry("a", 0.3));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 2);
    }
}
