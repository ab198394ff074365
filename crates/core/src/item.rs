use std::fmt::Debug;
use std::hash::Hash;

use crate::budget::Budget;

/// Anything a bag can hold: a stable key plus a mutable budget.
///
/// Implementations must never change their key once created; bags index
/// items by key and by a rank derived from the budget.
pub trait Item: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn key(&self) -> &Self::Key;

    fn budget(&self) -> &Budget;

    fn budget_mut(&mut self) -> &mut Budget;
}

/// Minimal item: a key with a budget attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<K> {
    pub key: K,
    pub budget: Budget,
}

impl<K> Entry<K> {
    pub fn new(key: K, budget: Budget) -> Self {
        Self { key, budget }
    }
}

impl<K> Item for Entry<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    type Key = K;

    fn key(&self) -> &K {
        &self.key
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }
}
