//! Pool of concurrent workers.

use std::{io, num::NonZeroUsize, thread};

use super::{ExecutionContext, Work, workers::Workers};

/// Runs work on several threads sharing one FIFO queue.
///
/// Work starts in posting order but may finish in any order. Handlers fed
/// from a pooled context must tolerate concurrent calls.
pub struct PooledContext {
    workers: Workers,
    size: usize,
}

impl PooledContext {
    /// Spawn `size` workers named `name.0`, `name.1`, ...
    ///
    /// A `size` of zero is raised to one.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when a thread cannot be spawned.
    pub fn spawn(name: impl Into<String>, size: usize) -> io::Result<Self> {
        let size = size.max(1);
        Ok(Self { workers: Workers::spawn(name.into(), size)?, size })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl ExecutionContext for PooledContext {
    fn post(&self, work: Work) {
        self.workers.post(work);
    }

    fn dispose(&self) {
        self.workers.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.workers.is_disposed()
    }
}

/// Worker count used when none is configured.
pub fn default_pool_size() -> usize {
    thread::available_parallelism().map_or(4, NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Arc, Barrier, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use super::*;

    #[test]
    fn runs_work_concurrently() {
        let context = PooledContext::spawn("pooled-test", 3).expect("spawn");
        let barrier = Arc::new(Barrier::new(3));
        let threads = Arc::new(Mutex::new(HashSet::new()));

        for _ in 0..3 {
            let barrier = Arc::clone(&barrier);
            let threads = Arc::clone(&threads);
            context.post(Box::new(move || {
                // all three must be in flight at once to pass the barrier
                barrier.wait();
                threads.lock().expect("lock").insert(std::thread::current().id());
            }));
        }
        context.dispose();

        assert_eq!(threads.lock().expect("lock").len(), 3);
    }

    #[test]
    fn dispose_drains_queued_work() {
        let context = PooledContext::spawn("pooled-drain", 2).expect("spawn");
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let runs = Arc::clone(&runs);
            context.post(Box::new(move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }));
        }
        context.dispose();

        assert_eq!(runs.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn zero_size_is_raised_to_one() {
        let context = PooledContext::spawn("pooled-zero", 0).expect("spawn");
        assert_eq!(context.size(), 1);
    }
}
