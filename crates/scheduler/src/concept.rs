//! Working-memory unit keyed by a term.
//!
//! A concept owns two private link bags. Clones of a [`Concept`] share those
//! bags through an `Arc<Mutex<_>>`, so the copy held by the concept bag, the
//! copy handed to a premise processor and the copy parked in the sub-concept
//! cache all see the same links. The concept's own budget is not shared:
//! the authoritative value lives inside whichever bag currently holds it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nous_core::{
    identity_hash, ActivationMode, Bag, Budget, CurveBag, Forgetting, Item, PutResult,
    SelectionCurve,
};

use crate::config::SchedulerConfig;
use crate::task::{TaskLink, TermLink};
use crate::term::Term;

/// Shape of the per-concept link bags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSettings {
    pub task_link_capacity: usize,
    pub term_link_capacity: usize,
    pub activation: ActivationMode,
    pub selection: SelectionCurve,
    /// Mixed with the term's identity hash to seed each concept's link bags.
    pub seed: u64,
}

impl LinkSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            task_link_capacity: config.task_link_capacity,
            term_link_capacity: config.term_link_capacity,
            activation: config.activation_mode,
            selection: SelectionCurve::new(config.selection_exponent),
            seed: config.seed,
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

pub struct ConceptLinks {
    task_links: CurveBag<TaskLink>,
    term_links: CurveBag<TermLink>,
}

impl ConceptLinks {
    fn new(term: &Term, settings: &LinkSettings) -> Self {
        let seed = settings.seed ^ identity_hash(term);
        Self {
            task_links: CurveBag::with_seed(settings.task_link_capacity, seed)
                .with_curve(settings.selection)
                .with_activation(settings.activation),
            term_links: CurveBag::with_seed(settings.term_link_capacity, seed.rotate_left(17))
                .with_curve(settings.selection)
                .with_activation(settings.activation),
        }
    }

    pub fn put_task_link(&mut self, link: TaskLink) -> PutResult<TaskLink> {
        self.task_links.put(link)
    }

    pub fn put_term_link(&mut self, link: TermLink) -> PutResult<TermLink> {
        self.term_links.put(link)
    }

    pub fn task_links(&self) -> &CurveBag<TaskLink> {
        &self.task_links
    }

    pub fn term_links(&self) -> &CurveBag<TermLink> {
        &self.term_links
    }

    /// Select up to `n` distinct task-links, decaying each one and putting
    /// back those still above threshold. Returns the decayed selections.
    pub fn draw_task_links(&mut self, n: usize, forgetting: &Forgetting) -> Vec<TaskLink> {
        draw(&mut self.task_links, n, forgetting)
    }

    /// As [`ConceptLinks::draw_task_links`], for term-links.
    pub fn draw_term_links(&mut self, n: usize, forgetting: &Forgetting) -> Vec<TermLink> {
        draw(&mut self.term_links, n, forgetting)
    }
}

fn draw<V: Item>(bag: &mut CurveBag<V>, n: usize, forgetting: &Forgetting) -> Vec<V> {
    let mut drawn = Vec::with_capacity(n.min(bag.len()));
    while drawn.len() < n {
        match bag.take_next() {
            Some(item) => drawn.push(item),
            None => break,
        }
    }
    for item in &mut drawn {
        if forgetting.apply(item.budget_mut()) {
            let _ = bag.put(item.clone());
        }
    }
    drawn
}

#[derive(Clone)]
pub struct Concept {
    term: Term,
    pub budget: Budget,
    links: Arc<Mutex<ConceptLinks>>,
    created_at: u64,
}

impl Concept {
    pub fn new(term: Term, budget: Budget, settings: &LinkSettings, created_at: u64) -> Self {
        let links = ConceptLinks::new(&term, settings);
        Self {
            term,
            budget,
            links: Arc::new(Mutex::new(links)),
            created_at,
        }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Memory clock tick at which the concept was first built.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Lock this concept's link bags. Never hold the guard across a call
    /// into a premise processor.
    pub fn links(&self) -> MutexGuard<'_, ConceptLinks> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn task_link_count(&self) -> usize {
        self.links().task_links.len()
    }

    pub fn term_link_count(&self) -> usize {
        self.links().term_links.len()
    }

    /// Whether two handles refer to the same link storage.
    pub fn shares_links_with(&self, other: &Concept) -> bool {
        Arc::ptr_eq(&self.links, &other.links)
    }
}

impl fmt::Debug for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Concept")
            .field("term", &self.term)
            .field("budget", &self.budget)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Concept {
    /// Term and budget; link contents are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term && self.budget == other.budget
    }
}

impl Item for Concept {
    type Key = Term;

    fn key(&self) -> &Term {
        &self.term
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }
}

/// Constructs fresh concept state for a term that is neither resident nor
/// cached.
pub trait ConceptBuilder: Send + Sync {
    fn build(&self, term: &Term, budget: Budget, links: &LinkSettings, now: u64) -> Concept;
}

/// Builds an empty concept carrying the incoming budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardConceptBuilder;

impl ConceptBuilder for StandardConceptBuilder {
    fn build(&self, term: &Term, budget: Budget, links: &LinkSettings, now: u64) -> Concept {
        Concept::new(term.clone(), budget, links, now)
    }
}
