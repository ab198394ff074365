//! Shared working memory: the concept bag, the sub-concept cache and the
//! lifecycle glue between them.
//!
//! Lock order is concept bag, then cache. Removal listeners always run after
//! both locks are released, so a listener may call back into memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use nous_core::{
    ActivationMode, Bag, Budget, CurveBag, DelayBag, DelayCurve, Forgetting, PutResult,
    SelectionCurve, Strategy, SubConceptCache,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::concept::{Concept, ConceptBuilder, LinkSettings};
use crate::config::SchedulerConfig;
use crate::task::{Stamp, Task, TaskLink, TermLink};
use crate::term::Term;

pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a concept left the concept bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// Displaced by a higher-ranked concept.
    Evicted,
    /// Decayed to or below the activation threshold.
    Forgotten,
    /// Removed explicitly through [`Memory::remove_concept`].
    Deleted,
}

pub type RemovalHook = Box<dyn Fn(&Concept, RemovalReason) + Send + Sync>;

/// Lifecycle counters exposed through the scheduler metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Concepts built from scratch by the concept builder.
    pub created: u64,
    /// Concepts taken back out of the sub-concept cache.
    pub reinstated: u64,
    pub evicted: u64,
    pub forgotten: u64,
    pub deleted: u64,
    /// Concepts the full cache had to destroy.
    pub cache_destroyed: u64,
    /// Concepts the concept bag refused outright.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    reinstated: AtomicU64,
    evicted: AtomicU64,
    forgotten: AtomicU64,
    deleted: AtomicU64,
    cache_destroyed: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MemoryStats {
        MemoryStats {
            created: self.created.load(Ordering::Relaxed),
            reinstated: self.reinstated.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            forgotten: self.forgotten.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            cache_destroyed: self.cache_destroyed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

type Removed = Vec<(Concept, RemovalReason)>;

pub struct Memory {
    concepts: Mutex<Box<dyn Bag<Concept>>>,
    cache: Mutex<SubConceptCache<Concept>>,
    builder: Arc<dyn ConceptBuilder>,
    links: LinkSettings,
    activation: ActivationMode,
    listeners: RwLock<Vec<RemovalHook>>,
    clock: AtomicU64,
    stamps: AtomicU64,
    counters: Counters,
}

impl Memory {
    /// Build memory for `config`; the concept bag strategy follows the
    /// configured firing policy.
    pub fn new(config: &SchedulerConfig, builder: Arc<dyn ConceptBuilder>) -> Self {
        let concepts: Box<dyn Bag<Concept>> = match config.policy.strategy() {
            Strategy::Curve => Box::new(
                CurveBag::with_seed(config.max_concepts, config.seed)
                    .with_curve(SelectionCurve::new(config.selection_exponent))
                    .with_activation(config.activation_mode),
            ),
            Strategy::Delay => Box::new(
                DelayBag::new(config.max_concepts)
                    .with_curve(DelayCurve::new(config.max_fire_delay))
                    .with_activation(config.activation_mode),
            ),
        };
        let cache = SubConceptCache::new(config.resolved_sub_concepts())
            .with_activation(config.activation_mode);

        Self {
            concepts: Mutex::new(concepts),
            cache: Mutex::new(cache),
            builder,
            links: LinkSettings::from_config(config),
            activation: config.activation_mode,
            listeners: RwLock::new(Vec::new()),
            clock: AtomicU64::new(0),
            stamps: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Register a listener fired once for every concept that leaves the
    /// concept bag by eviction, forgetting or deletion.
    pub fn on_concept_removed(
        &self,
        hook: impl Fn(&Concept, RemovalReason) + Send + Sync + 'static,
    ) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    // ── Lookup ──────────────────────────────────────────────────────

    pub fn concept(&self, term: &Term) -> Option<Concept> {
        lock(&self.concepts).get(term).cloned()
    }

    /// Concept parked in the sub-concept cache, if any.
    pub fn cached_concept(&self, term: &Term) -> Option<Concept> {
        lock(&self.cache).get(term).cloned()
    }

    /// Concept bag occupancy.
    pub fn size(&self) -> usize {
        lock(&self.concepts).len()
    }

    pub fn cache_size(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.concepts).capacity()
    }

    pub fn strategy(&self) -> Strategy {
        lock(&self.concepts).strategy()
    }

    /// Copy of every resident concept, in the bag's iteration order.
    pub fn concepts(&self) -> Vec<Concept> {
        lock(&self.concepts).snapshot()
    }

    // ── Conceptualization ───────────────────────────────────────────

    /// Create or reactivate the concept for `term`.
    ///
    /// A resident concept merges `budget` in place. Otherwise a cached
    /// concept is reinstated with `budget` merged, or, when
    /// `create_if_missing` is set, a new one is built. The whole lookup and
    /// insert runs under the concept-bag lock, so concurrent calls for the
    /// same term never produce two concepts.
    ///
    /// A concept the bag refuses is parked in the cache and still returned,
    /// so its links stay reachable. Returns `None` only when no concept
    /// exists for `term` and `create_if_missing` is unset.
    pub fn conceptualize(
        &self,
        term: &Term,
        budget: Budget,
        create_if_missing: bool,
    ) -> Option<Concept> {
        let mut removed = Removed::new();
        let result = {
            let mut bag = lock(&self.concepts);
            if bag.contains(term) {
                let mode = self.activation;
                bag.update(term, &mut |c| c.budget.activate(&budget, mode));
                bag.get(term).cloned()
            } else {
                let mut cache = lock(&self.cache);
                let candidate = match cache.take(term) {
                    Some(mut cached) => {
                        cached.budget.activate(&budget, self.activation);
                        Counters::bump(&self.counters.reinstated);
                        trace!(term = %term, "reinstating cached concept");
                        Some(cached)
                    }
                    None if create_if_missing => {
                        Counters::bump(&self.counters.created);
                        Some(self.builder.build(term, budget, &self.links, self.time()))
                    }
                    None => None,
                };
                candidate.and_then(|concept| match bag.put(concept.clone()) {
                    PutResult::Inserted | PutResult::Merged => Some(concept),
                    PutResult::Evicted(evicted) => {
                        self.evict_into(&mut cache, evicted, RemovalReason::Evicted, &mut removed);
                        Some(concept)
                    }
                    PutResult::Rejected(concept) => {
                        Counters::bump(&self.counters.rejected);
                        trace!(term = %term, "concept bag refused concept; parking it");
                        self.stash(&mut cache, concept.clone());
                        Some(concept)
                    }
                })
            }
        };
        self.notify(removed);
        result
    }

    /// Link `task` into the task-link bag of its concept, resident or
    /// cached. Returns whether the concept exists and the link was accepted.
    pub fn link_task(&self, term: &Term, task: Arc<Task>) -> bool {
        match self.known_concept(term) {
            Some(concept) => {
                let link = TaskLink::new(task);
                concept.links().put_task_link(link).accepted()
            }
            None => false,
        }
    }

    /// Link `term` to `target` with `budget`, whether the concept is
    /// resident or cached. Returns whether the concept exists and the link
    /// was accepted.
    pub fn link_term(&self, term: &Term, target: Term, budget: Budget) -> bool {
        match self.known_concept(term) {
            Some(concept) => concept
                .links()
                .put_term_link(TermLink::new(target, budget))
                .accepted(),
            None => false,
        }
    }

    // ── Removal ─────────────────────────────────────────────────────

    /// Explicitly delete a concept. It is parked in the sub-concept cache
    /// like any other removal.
    pub fn remove_concept(&self, term: &Term) -> Option<Concept> {
        let mut removed = Removed::new();
        let result = {
            let mut bag = lock(&self.concepts);
            let concept = bag.remove(term)?;
            let mut cache = lock(&self.cache);
            self.evict_into(&mut cache, concept.clone(), RemovalReason::Deleted, &mut removed);
            concept
        };
        self.notify(removed);
        Some(result)
    }

    /// Decay a resident concept's budget. A concept that falls to or below
    /// threshold is forgotten into the cache. Returns whether it is still
    /// resident.
    pub fn decay_concept(&self, term: &Term, forgetting: &Forgetting) -> bool {
        let mut removed = Removed::new();
        let retained = {
            let mut bag = lock(&self.concepts);
            let mut above = true;
            if !bag.update(term, &mut |c| above = forgetting.apply(&mut c.budget)) {
                return false;
            }
            if !above {
                if let Some(concept) = bag.remove(term) {
                    let mut cache = lock(&self.cache);
                    self.evict_into(&mut cache, concept, RemovalReason::Forgotten, &mut removed);
                }
            }
            above
        };
        self.notify(removed);
        retained
    }

    /// Select every concept that is ready to fire. Each one is decayed and
    /// either rescheduled or, below threshold, forgotten into the cache.
    ///
    /// The continuous policy pairs this with a delay bag, which yields
    /// exactly the concepts whose due time has elapsed. A rescheduled
    /// concept is never due again in the same tick, so at most one pass
    /// over the residents is made.
    pub fn take_due(&self, forgetting: &Forgetting) -> Vec<Concept> {
        let mut removed = Removed::new();
        let fired = {
            let mut bag = lock(&self.concepts);
            let limit = bag.len();
            let mut fired = Vec::new();
            while fired.len() < limit {
                let Some(concept) = bag.forget_next(forgetting) else {
                    break;
                };
                if !bag.contains(concept.term()) {
                    let mut cache = lock(&self.cache);
                    self.evict_into(
                        &mut cache,
                        concept.clone(),
                        RemovalReason::Forgotten,
                        &mut removed,
                    );
                }
                fired.push(concept);
            }
            fired
        };
        self.notify(removed);
        fired
    }

    /// Clear the concept bag and the cache together. No removal listeners
    /// fire.
    pub fn reset(&self) {
        let mut bag = lock(&self.concepts);
        let mut cache = lock(&self.cache);
        bag.clear();
        cache.clear();
        debug!("memory reset");
    }

    // ── Clock and stamps ────────────────────────────────────────────

    pub fn time(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Advance the logical clock by one tick and propagate it to the concept
    /// bag. Returns the new time.
    pub fn advance_clock(&self) -> u64 {
        let mut bag = lock(&self.concepts);
        let now = self.clock.fetch_add(1, Ordering::AcqRel) + 1;
        bag.set_time(now);
        now
    }

    /// Allocate a fresh task stamp.
    pub fn next_stamp(&self) -> Stamp {
        Stamp(self.stamps.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn stats(&self) -> MemoryStats {
        self.counters.snapshot()
    }

    /// Panic if either container's invariants are broken.
    pub fn check_invariants(&self) {
        lock(&self.concepts).check_invariants();
        lock(&self.cache).check_invariants();
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Resident concept, else the cached one. Links are shared between
    /// handles, so linking through either copy reaches the same bags.
    fn known_concept(&self, term: &Term) -> Option<Concept> {
        let bag = lock(&self.concepts);
        if let Some(concept) = bag.get(term) {
            return Some(concept.clone());
        }
        let cache = lock(&self.cache);
        cache.get(term).cloned()
    }

    fn evict_into(
        &self,
        cache: &mut SubConceptCache<Concept>,
        concept: Concept,
        reason: RemovalReason,
        removed: &mut Removed,
    ) {
        let counter = match reason {
            RemovalReason::Evicted => &self.counters.evicted,
            RemovalReason::Forgotten => &self.counters.forgotten,
            RemovalReason::Deleted => &self.counters.deleted,
        };
        Counters::bump(counter);
        trace!(term = %concept.term(), ?reason, "concept left memory");
        self.stash(cache, concept.clone());
        removed.push((concept, reason));
    }

    fn stash(&self, cache: &mut SubConceptCache<Concept>, concept: Concept) {
        if let Some(destroyed) = cache.insert(concept) {
            Counters::bump(&self.counters.cache_destroyed);
            trace!(term = %destroyed.term(), "sub-concept cache destroyed concept");
        }
    }

    fn notify(&self, removed: Removed) {
        if removed.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (concept, reason) in &removed {
            for hook in listeners.iter() {
                hook(concept, *reason);
            }
        }
    }
}
