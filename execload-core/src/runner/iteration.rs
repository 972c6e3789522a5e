use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one iteration, shared by its request, response and derived samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationContext {
    pub iteration_index: u64,
    pub session_id: String,
}

impl IterationContext {
    pub fn new(run_id: &str, iteration_index: u64) -> Self {
        Self {
            iteration_index,
            session_id: format!("{run_id}_{iteration_index}"),
        }
    }
}

/// Run-wide source of dense, 0-based iteration indices.
#[derive(Debug)]
pub(crate) struct IterationCounter {
    run_id: Arc<str>,
    next: AtomicU64,
}

impl IterationCounter {
    pub(crate) fn new(run_id: &str) -> Self {
        Self {
            run_id: Arc::from(run_id),
            next: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_context(&self) -> IterationContext {
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        IterationContext::new(&self.run_id, idx)
    }

    pub(crate) fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
