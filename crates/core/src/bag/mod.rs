//! Capacity-bounded, budget-ordered containers ("bags").
//!
//! Two backing implementations share the [`Bag`] contract:
//! - [`CurveBag`]: dense ascending array positioned by binary search;
//!   selection samples ranks through a [`SelectionCurve`] that favours the top
//!   of the order without starving the bottom.
//! - [`DelayBag`]: every item carries a due time derived from its budget;
//!   selection yields only items whose due time has elapsed, emulating many
//!   independent timers.
//!
//! Callers that own a `Box<dyn Bag<V>>` never learn which one is active.

pub mod curve;
pub mod delay;

use serde::{Deserialize, Serialize};

use crate::budget::{Forgetting, Rank};
use crate::item::Item;

pub use curve::{CurveBag, SelectionCurve};
pub use delay::{DelayBag, DelayCurve};

/// Which selection strategy a bag implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Curve,
    Delay,
}

/// Outcome of [`Bag::put`].
#[derive(Debug)]
#[must_use]
pub enum PutResult<V> {
    /// New key stored without displacing anything.
    Inserted,
    /// Key already present; budgets merged and the entry repositioned.
    Merged,
    /// New key stored; the previous minimum was removed to make room.
    Evicted(V),
    /// Incoming item ranks below every resident item. The bag is unchanged
    /// and the item is handed back.
    Rejected(V),
}

impl<V> PutResult<V> {
    pub fn accepted(&self) -> bool {
        !matches!(self, PutResult::Rejected(_))
    }

    pub fn into_evicted(self) -> Option<V> {
        match self {
            PutResult::Evicted(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_rejected(self) -> Option<V> {
        match self {
            PutResult::Rejected(v) => Some(v),
            _ => None,
        }
    }
}

/// Bounded associative container ordered by budget.
///
/// Invariants held after every operation:
/// - `len() <= capacity()`
/// - each key appears once in the item map and once in every order index
/// - an accepted put that evicts removes exactly the current minimum rank
pub trait Bag<V: Item>: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &V::Key) -> Option<&V>;

    fn contains(&self, key: &V::Key) -> bool {
        self.get(key).is_some()
    }

    /// Insert `item`, merging into an existing entry with the same key.
    fn put(&mut self, item: V) -> PutResult<V>;

    /// Mutate the item stored under `key` and reposition it. The closure
    /// must not change the key. Returns `false` when the key is absent.
    fn update(&mut self, key: &V::Key, f: &mut dyn FnMut(&mut V)) -> bool;

    fn remove(&mut self, key: &V::Key) -> Option<V>;

    /// Select the next item without removing it.
    fn peek_next(&mut self) -> Option<&V>;

    /// Select the next item and remove it.
    fn take_next(&mut self) -> Option<V>;

    fn clear(&mut self);

    /// Descending rank order for curve bags, due order for delay bags.
    fn iter(&self) -> Box<dyn Iterator<Item = &V> + '_>;

    /// Rank of the entry that would be evicted next.
    fn min_rank(&self) -> Option<Rank>;

    /// Advance the bag's logical clock. Only meaningful for delay bags.
    fn set_time(&mut self, _now: u64) {}

    /// Panic if the container's indexes disagree or a bound is violated.
    fn check_invariants(&self);

    fn snapshot(&self) -> Vec<V> {
        self.iter().cloned().collect()
    }

    /// Select the next item, decay it, and put it back if it is still above
    /// threshold. The selected item is returned either way.
    fn forget_next(&mut self, forgetting: &Forgetting) -> Option<V> {
        let mut item = self.take_next()?;
        if forgetting.apply(item.budget_mut()) {
            // The slot freed by take_next guarantees this put is accepted.
            let _ = self.put(item.clone());
        }
        Some(item)
    }
}
