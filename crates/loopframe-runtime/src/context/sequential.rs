//! Single background worker.

use std::io;

use super::{ExecutionContext, Work, workers::Workers};

/// Runs work on one dedicated thread in posting order.
///
/// At most one unit of work runs at any instant, which is what gives a loop
/// its one-update-in-flight guarantee.
pub struct SequentialContext {
    workers: Workers,
}

impl SequentialContext {
    /// Spawn the worker thread, named `name`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when the thread cannot be spawned.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        Ok(Self { workers: Workers::spawn(name.into(), 1)? })
    }
}

impl ExecutionContext for SequentialContext {
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
