//! Inline execution on the caller's thread.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{ContextId, ExecutionContext, Work, run_inline};

/// Runs work synchronously inside `post`.
///
/// Used for observation where no thread hop is wanted. Panics raised by the
/// work propagate to the caller of `post`.
#[derive(Debug)]
pub struct ImmediateContext {
    id: ContextId,
    disposed: AtomicBool,
}

impl Default for ImmediateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmediateContext {
    /// Create an immediate context.
    pub fn new() -> Self {
        Self { id: ContextId::next(), disposed: AtomicBool::new(false) }
    }
}

impl ExecutionContext for ImmediateContext {
    fn post(&self, work: Work) {
        if self.is_disposed() {
            tracing::trace!("dropping work posted to disposed immediate context");
            return;
        }
        run_inline(self.id, work);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn runs_work_before_post_returns() {
        let context = ImmediateContext::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        context.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drops_work_after_dispose() {
        let context = ImmediateContext::new();
        let runs = Arc::new(AtomicUsize::new(0));

        context.dispose();
        let counter = Arc::clone(&runs);
        context.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
