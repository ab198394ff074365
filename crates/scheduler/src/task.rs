use std::fmt;
use std::sync::Arc;

use nous_core::{Budget, Item};
use serde::{Deserialize, Serialize};

use crate::term::Term;

/// Unique task identity, allocated by [`Memory::next_stamp`](crate::memory::Memory::next_stamp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(pub u64);

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A budgeted statement awaiting or having received processing.
///
/// `content` is opaque to the scheduler; premise processors interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub stamp: Stamp,
    pub term: Term,
    pub budget: Budget,
    /// Stamp of the task this one was derived from, if any.
    pub parent: Option<Stamp>,
    pub content: Arc<str>,
}

impl Task {
    pub fn new(stamp: Stamp, term: impl Into<Term>, budget: Budget) -> Self {
        let term = term.into();
        Self {
            stamp,
            content: Arc::from(term.as_str()),
            term,
            budget,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Stamp) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_content(mut self, content: impl AsRef<str>) -> Self {
        self.content = Arc::from(content.as_ref());
        self
    }

    /// Whether this task came out of a premise processor rather than
    /// external input.
    pub fn is_derived(&self) -> bool {
        self.parent.is_some()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.budget, self.stamp, self.content)
    }
}

impl Item for Task {
    type Key = Stamp;

    fn key(&self) -> &Stamp {
        &self.stamp
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }
}

/// Budgeted reference from a concept to a task.
#[derive(Debug, Clone)]
pub struct TaskLink {
    pub task: Arc<Task>,
    pub budget: Budget,
}

impl TaskLink {
    pub fn new(task: Arc<Task>) -> Self {
        let budget = task.budget;
        Self { task, budget }
    }
}

impl Item for TaskLink {
    type Key = Stamp;

    fn key(&self) -> &Stamp {
        &self.task.stamp
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }
}

/// Budgeted reference from a concept to a related term.
///
/// Holds the target's key, never the target concept itself; resolve it
/// through [`Memory::concept`](crate::memory::Memory::concept).
#[derive(Debug, Clone, PartialEq)]
pub struct TermLink {
    pub target: Term,
    pub budget: Budget,
}

impl TermLink {
    pub fn new(target: impl Into<Term>, budget: Budget) -> Self {
        Self {
            target: target.into(),
            budget,
        }
    }
}

impl Item for TermLink {
    type Key = Term;

    fn key(&self) -> &Term {
        &self.target
    }

    fn budget(&self) -> &Budget {
        &self.budget
    }

    fn budget_mut(&mut self) -> &mut Budget {
        &mut self.budget
    }
}
