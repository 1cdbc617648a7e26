//! Execution on a tokio runtime.

use std::sync::{
    Arc, Condvar, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::Handle;

use super::{ContextId, ExecutionContext, Work, run_contained};

/// Runs work on the blocking pool of a tokio runtime.
///
/// Loop work blocks on locks and user code, so it goes through
/// `spawn_blocking` rather than the async worker threads. Ordering between
/// units of work is not guaranteed, which makes this context suitable for
/// effects only.
pub struct TokioContext {
    handle: Handle,
    id: ContextId,
    disposed: AtomicBool,
    in_flight: Arc<InFlight>,
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(self: &Arc<Self>) -> InFlightTicket {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        InFlightTicket { in_flight: Arc::clone(self) }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Marks one unit of work finished when dropped, whether it ran or the
/// runtime discarded it.
struct InFlightTicket {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut count = self.in_flight.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.in_flight.idle.notify_all();
        }
    }
}

impl TokioContext {
    /// Context spawning onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            id: ContextId::next(),
            disposed: AtomicBool::new(false),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Context spawning onto the runtime the caller is running in.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl ExecutionContext for TokioContext {
    fn post(&self, work: Work) {
        if self.is_disposed() {
            tracing::trace!(context = "tokio", "dropping work posted to disposed context");
            return;
        }

        let ticket = self.in_flight.begin();
        let id = self.id;
        self.handle.spawn_blocking(move || {
            let _ticket = ticket;
            run_contained(id, "tokio", work);
        });
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.id.is_current() {
            tracing::trace!(context = "tokio", "disposed from own work, not waiting");
            return;
        }
        self.in_flight.wait_idle();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn dispose_waits_for_spawned_work() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("runtime");
        let context = TokioContext::new(runtime.handle().clone());
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let runs = Arc::clone(&runs);
            context.post(Box::new(move || {
                std::thread::sleep(std::time::Duration::from_millis(2));
                runs.fetch_add(1, Ordering::SeqCst);
            }));
        }
        context.dispose();

        assert_eq!(runs.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn current_is_none_outside_runtime() {
        assert!(TokioContext::current().is_none());
    }

    #[test]
    fn contains_panicking_work() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .expect("runtime");
        let context = TokioContext::new(runtime.handle().clone());
        let runs = Arc::new(AtomicUsize::new(0));

        context.post(Box::new(|| std::panic::panic_any("boom")));
        let counter = Arc::clone(&runs);
        context.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        context.dispose();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
