//! Thread-backed work queue shared by the sequential and pooled contexts.

use std::{
    io,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};

use super::{ContextId, Work, run_contained};

enum Job {
    Run(Work),
    Stop,
}

/// FIFO queue drained by a fixed set of worker threads.
pub(super) struct Workers {
    id: ContextId,
    name: String,
    sender: Sender<Job>,
    disposed: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Workers {
    /// Spawn `count` workers (at least one) named after `name`.
    pub(super) fn spawn(name: String, count: usize) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let id = ContextId::next();
        let count = count.max(1);

        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let thread_name = if count == 1 { name.clone() } else { format!("{name}.{index}") };
            let receiver = receiver.clone();
            let context = name.clone();
            let spawned = thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(id, &context, &receiver));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for _ in &handles {
                        let _ = sender.send(Job::Stop);
                    }
                    return Err(err);
                },
            }
        }

        tracing::trace!(context = %name, workers = count, "execution context started");
        Ok(Self { id, name, sender, disposed: AtomicBool::new(false), handles: Mutex::new(handles) })
    }

    pub(super) fn post(&self, work: Work) {
        if self.is_disposed() || self.sender.send(Job::Run(work)).is_err() {
            tracing::trace!(context = %self.name, "dropping work posted to disposed context");
        }
    }

    pub(super) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for _ in &handles {
            let _ = self.sender.send(Job::Stop);
        }

        if self.id.is_current() {
            tracing::trace!(context = %self.name, "disposed from own worker, not waiting");
            return;
        }

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(context = %self.name, "worker thread terminated abnormally");
            }
        }
        tracing::trace!(context = %self.name, "execution context stopped");
    }

    pub(super) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn worker_loop(id: ContextId, context: &str, receiver: &Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        match job {
            Job::Run(work) => run_contained(id, context, work),
            Job::Stop => break,
        }
    }
}
