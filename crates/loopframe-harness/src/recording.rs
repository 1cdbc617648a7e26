//! Recording doubles for connectables and consumers.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use loopframe_core::{
    Connectable, Connection, ConnectionError, ConnectionGuard, Consumer, Disposable, GuardRelease,
};

/// Values plus a condition variable signalled on every change.
struct Log<T> {
    entries: Mutex<T>,
    changed: Condvar,
}

impl<T> Log<T> {
    fn new(entries: T) -> Self {
        Self { entries: Mutex::new(entries), changed: Condvar::new() }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, change: impl FnOnce(&mut T)) {
        change(&mut self.lock());
        self.changed.notify_all();
    }

    /// Block until `done` holds or `timeout` elapses.
    fn wait(&self, timeout: Duration, done: impl Fn(&T) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut entries = self.lock();
        while !done(&entries) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            entries = self
                .changed
                .wait_timeout(entries, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Consumer that records every value it receives.
pub struct RecordingConsumer<T> {
    log: Arc<Log<Vec<T>>>,
}

impl<T> Clone for RecordingConsumer<T> {
    fn clone(&self) -> Self {
        Self { log: Arc::clone(&self.log) }
    }
}

impl<T> Default for RecordingConsumer<T> {
    fn default() -> Self {
        Self { log: Arc::new(Log::new(Vec::new())) }
    }
}

impl<T: Clone> RecordingConsumer<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values received so far, in arrival order.
    pub fn values(&self) -> Vec<T> {
        self.log.lock().clone()
    }

    /// Block until at least `count` values arrived.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        self.log.wait(timeout, |values| values.len() >= count)
    }
}

impl<T: Send> Consumer<T> for RecordingConsumer<T> {
    fn accept(&self, value: T) {
        self.log.update(|values| values.push(value));
    }
}

type Reply<I, O> = dyn Fn(&I) -> Option<O> + Send + Sync;

struct Recorded<I> {
    values: Vec<I>,
    connects: usize,
    disposals: usize,
}

/// Connectable that records connections, accepted values and disposals.
///
/// Works as an effect handler (`I` = effect, `O` = event) or as a model-aware
/// event source (`I` = model, `O` = event). An optional reply function turns
/// accepted values into output values. One connection may be open at a time.
///
/// Disposal is counted on every call, so a connection disposed twice shows
/// up as two disposals.
pub struct RecordingConnectable<I, O> {
    log: Arc<Log<Recorded<I>>>,
    reply: Option<Arc<Reply<I, O>>>,
    guard: Arc<ConnectionGuard>,
}

impl<I, O> Clone for RecordingConnectable<I, O> {
    fn clone(&self) -> Self {
        Self { log: Arc::clone(&self.log), reply: self.reply.clone(), guard: Arc::clone(&self.guard) }
    }
}

impl<I, O> Default for RecordingConnectable<I, O> {
    fn default() -> Self {
        Self {
            log: Arc::new(Log::new(Recorded { values: Vec::new(), connects: 0, disposals: 0 })),
            reply: None,
            guard: Arc::new(ConnectionGuard::new("recording connectable")),
        }
    }
}

impl<I, O> RecordingConnectable<I, O>
where
    I: Clone + Send + 'static,
    O: 'static,
{
    /// Recorder that never produces output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder that emits `reply(value)` for every accepted value that maps
    /// to `Some`.
    pub fn with_reply(reply: impl Fn(&I) -> Option<O> + Send + Sync + 'static) -> Self {
        Self { reply: Some(Arc::new(reply)), ..Self::default() }
    }

    /// Values accepted so far, across all connections.
    pub fn values(&self) -> Vec<I> {
        self.log.lock().values.clone()
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.log.lock().connects
    }

    /// Number of `dispose` calls on connections.
    pub fn dispose_count(&self) -> usize {
        self.log.lock().disposals
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    /// Block until at least `count` values were accepted.
    pub fn wait_for_values(&self, count: usize, timeout: Duration) -> bool {
        self.log.wait(timeout, |recorded| recorded.values.len() >= count)
    }
}

impl<I, O> Connectable<I, O> for RecordingConnectable<I, O>
where
    I: Clone + Send + 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        let release = self.guard.acquire()?;
        self.log.update(|recorded| recorded.connects += 1);
        tracing::trace!("recording connectable connected");
        Ok(Box::new(RecordingConnection {
            log: Arc::clone(&self.log),
            reply: self.reply.clone(),
            output,
            release,
        }))
    }
}

struct RecordingConnection<I, O> {
    log: Arc<Log<Recorded<I>>>,
    reply: Option<Arc<Reply<I, O>>>,
    output: Arc<dyn Consumer<O>>,
    release: GuardRelease,
}

impl<I: Send, O> Disposable for RecordingConnection<I, O> {
    fn dispose(&self) {
        self.log.update(|recorded| recorded.disposals += 1);
        self.release.release();
    }
}

impl<I: Send, O> Connection<I> for RecordingConnection<I, O> {
    fn accept(&self, value: I) {
        let reply = self.reply.as_ref().and_then(|reply| reply(&value));
        self.log.update(|recorded| recorded.values.push(value));
        if let Some(reply) = reply {
            self.output.accept(reply);
        }
    }
}
