use std::any::Any;

use crate::concept::Concept;
use crate::memory::Memory;
use crate::task::{Task, TaskLink, TermLink};

/// Error type for premise processing.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Premise processing failed: {0}")]
    Failed(String),
    #[error("Premise processor panicked: {0}")]
    Panicked(String),
}

impl ProcessError {
    /// Convert a `catch_unwind` payload into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ProcessError::Panicked(msg)
    }
}

/// External inference logic invoked by the scheduler.
///
/// Both entry points return derived tasks; the scheduler enqueues them as
/// new input at the end of the cycle and never inspects them further.
/// Implementations may read and write memory (for example to add
/// term-links) but must not block on the scheduler itself.
pub trait PremiseProcessor: Send + Sync {
    /// Process a freshly admitted task on its own.
    fn process_direct(&self, memory: &Memory, task: &Task) -> Result<Vec<Task>, ProcessError>;

    /// Process a fired concept together with one task-link and the
    /// term-links drawn for it. `term_links` may be empty.
    fn process_indirect(
        &self,
        memory: &Memory,
        concept: &Concept,
        task_link: &TaskLink,
        term_links: &[TermLink],
    ) -> Result<Vec<Task>, ProcessError>;
}

/// Processor that derives nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProcessor;

impl PremiseProcessor for NullProcessor {
    fn process_direct(&self, _memory: &Memory, _task: &Task) -> Result<Vec<Task>, ProcessError> {
        Ok(Vec::new())
    }

    fn process_indirect(
        &self,
        _memory: &Memory,
        _concept: &Concept,
        _task_link: &TaskLink,
        _term_links: &[TermLink],
    ) -> Result<Vec<Task>, ProcessError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let err = ProcessError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Premise processor panicked: boom");

        let err = ProcessError::from_panic(Box::new(String::from("bang")));
        assert!(err.to_string().contains("bang"));

        let err = ProcessError::from_panic(Box::new(42u32));
        assert!(err.to_string().contains("non-string"));
    }
}
