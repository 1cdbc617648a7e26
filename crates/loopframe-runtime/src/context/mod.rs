//! Execution contexts.
//!
//! An [`ExecutionContext`] decides where a unit of [`Work`] runs. Loops use
//! one context for events and one for effects:
//!
//! - [`ImmediateContext`]: runs work inline on the caller's thread
//! - [`SequentialContext`]: one background worker, FIFO; total order and
//!   mutual exclusion for event processing
//! - [`PooledContext`]: several workers sharing one queue; effect dispatch
//!   without blocking event intake
//! - [`TokioContext`]: tokio's blocking pool via a runtime handle
//!
//! # Disposal policy
//!
//! All contexts share one policy. After `dispose`:
//! - work posted later is dropped silently (traced at `trace` level)
//! - work queued before disposal still runs
//! - `dispose` waits for queued and in-flight work to finish, except when it
//!   is called from work running on the same context, where waiting would
//!   deadlock; the context then winds down without waiting
//!
//! # Panics
//!
//! Queued contexts contain a panic per work item: the panic is logged at
//! `error` level and the worker keeps serving later work. The immediate
//! context lets panics propagate to the caller of `post`.

use std::{
    cell::RefCell,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use loopframe_core::panic_message;

mod immediate;
mod pooled;
mod sequential;
mod tokio_handle;
mod workers;

pub use immediate::ImmediateContext;
pub use pooled::{PooledContext, default_pool_size};
pub use sequential::SequentialContext;
pub use tokio_handle::TokioContext;

/// Unit of work scheduled on an [`ExecutionContext`].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling strategy for units of work.
pub trait ExecutionContext: Send + Sync {
    /// Schedule `work`. Dropped if the context is disposed.
    fn post(&self, work: Work);

    /// Stop accepting work and wind down. Repeated calls have no effect.
    fn dispose(&self);

    /// Whether `dispose` has been called.
    fn is_disposed(&self) -> bool;
}

type Producer = dyn Fn() -> io::Result<Arc<dyn ExecutionContext>> + Send + Sync;

/// Produces a fresh execution context for each started loop.
#[derive(Clone)]
pub struct ContextFactory {
    producer: Arc<Producer>,
}

impl ContextFactory {
    /// Factory backed by an arbitrary producer.
    pub fn new(
        producer: impl Fn() -> io::Result<Arc<dyn ExecutionContext>> + Send + Sync + 'static,
    ) -> Self {
        Self { producer: Arc::new(producer) }
    }

    /// Fresh [`ImmediateContext`] per loop.
    pub fn immediate() -> Self {
        Self::new(|| Ok(Arc::new(ImmediateContext::new())))
    }

    /// Fresh [`SequentialContext`] per loop. Worker threads are named
    /// `{prefix}-{n}`.
    pub fn sequential(prefix: &'static str) -> Self {
        Self::new(move || Ok(Arc::new(SequentialContext::spawn(worker_name(prefix))?)))
    }

    /// Fresh [`PooledContext`] with `workers` threads per loop.
    pub fn pooled(prefix: &'static str, workers: usize) -> Self {
        Self::new(move || Ok(Arc::new(PooledContext::spawn(worker_name(prefix), workers)?)))
    }

    /// Fresh [`TokioContext`] on `handle` per loop.
    pub fn tokio(handle: tokio::runtime::Handle) -> Self {
        Self::new(move || Ok(Arc::new(TokioContext::new(handle.clone()))))
    }

    /// Produce a context.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when a worker thread cannot be spawned.
    pub fn create(&self) -> io::Result<Arc<dyn ExecutionContext>> {
        (self.producer)()
    }
}

impl std::fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFactory").finish_non_exhaustive()
    }
}

fn worker_name(prefix: &str) -> String {
    static WORKER_COUNT: AtomicU64 = AtomicU64::new(0);
    format!("{prefix}-{}", WORKER_COUNT.fetch_add(1, Ordering::Relaxed) + 1)
}

thread_local! {
    /// Contexts whose work is executing on this thread, innermost last.
    static ACTIVE_CONTEXTS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Identity of one context instance, used to detect re-entrant disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this thread is currently running work posted to this context.
    pub(crate) fn is_current(self) -> bool {
        ACTIVE_CONTEXTS.with(|active| active.borrow().contains(&self.0))
    }

    fn enter(self) -> ActiveGuard {
        ACTIVE_CONTEXTS.with(|active| active.borrow_mut().push(self.0));
        ActiveGuard
    }
}

/// Pops the innermost active context, including during unwinding.
struct ActiveGuard;

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_CONTEXTS.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// Run `work` as part of context `id`, letting panics propagate.
pub(crate) fn run_inline(id: ContextId, work: Work) {
    let _active = id.enter();
    work();
}

/// Run `work` as part of context `id` on a worker thread, containing panics.
pub(crate) fn run_contained(id: ContextId, context: &str, work: Work) {
    let _active = id.enter();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
        tracing::error!(context, "work panicked: {}", panic_message(payload.as_ref()));
    }
}
