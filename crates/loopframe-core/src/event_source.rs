//! Event source adapters.
//!
//! An [`EventSource`] is a push-style producer: `subscribe` registers a
//! consumer and returns a [`Disposable`] that unsubscribes it. Loops talk to
//! event sources through the connection contract, so subscribe-style sources
//! are wrapped in an [`EventSourceConnectable`]. Several sources are combined
//! into one with [`MergedEventSource`].
//!
//! Event-source connections receive every model the loop publishes.
//! Subscribe-style sources have no use for models and ignore them.

use std::{
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    Connectable, Connection, ConnectionError, ConnectionGuard, Consumer, Disposable, GuardRelease,
    logger::panic_message,
};

/// Push-style producer of events.
pub trait EventSource<E>: Send + Sync {
    /// Start forwarding events to `consumer` until the returned handle is
    /// disposed.
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable>;
}

impl<E, S> EventSource<E> for Arc<S>
where
    S: EventSource<E> + ?Sized,
{
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        (**self).subscribe(consumer)
    }
}

/// Event source that never emits and ignores models.
///
/// Stateless, so one instance can back any number of concurrent loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSource;

struct NoopConnection;

impl Disposable for NoopConnection {
    fn dispose(&self) {}
}

impl<M> Connection<M> for NoopConnection {
    fn accept(&self, _model: M) {}
}

impl<M, E> Connectable<M, E> for NoopEventSource {
    fn connect(
        &self,
        _output: Arc<dyn Consumer<E>>,
    ) -> Result<Box<dyn Connection<M>>, ConnectionError> {
        Ok(Box::new(NoopConnection))
    }
}

impl<E> EventSource<E> for NoopEventSource {
    fn subscribe(&self, _consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        Box::new(NoopConnection)
    }
}

/// Connection-contract view of a subscribe-style [`EventSource`].
///
/// Connecting subscribes the source with the loop's event intake; disposing
/// the connection unsubscribes. One connection may be open at a time.
pub struct EventSourceConnectable<M, E> {
    source: Arc<dyn EventSource<E>>,
    guard: ConnectionGuard,
    _model: PhantomData<fn(M)>,
}

impl<M, E> EventSourceConnectable<M, E> {
    /// Wrap `source`.
    pub fn new(source: impl EventSource<E> + 'static) -> Self {
        Self::from_shared(Arc::new(source))
    }

    /// Wrap an already shared `source`.
    pub fn from_shared(source: Arc<dyn EventSource<E>>) -> Self {
        Self { source, guard: ConnectionGuard::new("event source"), _model: PhantomData }
    }
}

impl<M, E> Connectable<M, E> for EventSourceConnectable<M, E>
where
    M: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<E>>,
    ) -> Result<Box<dyn Connection<M>>, ConnectionError> {
        let release = self.guard.acquire()?;
        let subscription = self.source.subscribe(output);
        Ok(Box::new(SubscriptionConnection { subscription, release }))
    }
}

struct SubscriptionConnection {
    subscription: Box<dyn Disposable>,
    release: GuardRelease,
}

impl Disposable for SubscriptionConnection {
    fn dispose(&self) {
        self.subscription.dispose();
        self.release.release();
    }
}

impl<M> Connection<M> for SubscriptionConnection {
    fn accept(&self, _model: M) {}
}

/// Fan-in of several event sources.
///
/// Subscribing subscribes every child against the same consumer. Disposing
/// the merged subscription disposes every child once, even when a child's
/// disposal panics; such panics are logged and the remaining children are
/// still released.
pub struct MergedEventSource<E> {
    sources: Vec<Arc<dyn EventSource<E>>>,
}

impl<E: 'static> MergedEventSource<E> {
    /// Merge `sources` into one event source.
    pub fn from_sources(sources: impl IntoIterator<Item = Arc<dyn EventSource<E>>>) -> Self {
        Self { sources: sources.into_iter().collect() }
    }

    /// Number of merged children.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no child source is merged.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<E: 'static> EventSource<E> for MergedEventSource<E> {
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        let children =
            self.sources.iter().map(|source| source.subscribe(Arc::clone(&consumer))).collect();
        Box::new(MergedSubscription { children: Mutex::new(children) })
    }
}

struct MergedSubscription {
    children: Mutex<Vec<Box<dyn Disposable>>>,
}

impl Disposable for MergedSubscription {
    fn dispose(&self) {
        let children =
            std::mem::take(&mut *self.children.lock().unwrap_or_else(PoisonError::into_inner));

        let total = children.len();
        let mut failures = 0usize;
        for (index, child) in children.into_iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| child.dispose())) {
                failures += 1;
                tracing::error!(
                    child = index,
                    "event source disposal panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        if failures > 0 {
            tracing::warn!(failures, total, "merged event source disposed with failures");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;

    /// Source that emits its fixed events on subscribe.
    struct Replay {
        events: Vec<u32>,
        disposed: Arc<AtomicUsize>,
    }

    struct CountingDispose(Arc<AtomicUsize>);

    impl Disposable for CountingDispose {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl EventSource<u32> for Replay {
        fn subscribe(&self, consumer: Arc<dyn Consumer<u32>>) -> Box<dyn Disposable> {
            for event in &self.events {
                consumer.accept(*event);
            }
            Box::new(CountingDispose(Arc::clone(&self.disposed)))
        }
    }

    fn collector() -> (Arc<Mutex<Vec<u32>>>, Arc<dyn Consumer<u32>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let consumer: Arc<dyn Consumer<u32>> =
            Arc::new(move |value: u32| sink.lock().expect("lock").push(value));
        (seen, consumer)
    }

    #[test]
    fn connectable_forwards_events_and_unsubscribes() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let connectable: EventSourceConnectable<(), u32> =
            EventSourceConnectable::new(Replay { events: vec![1, 2], disposed: Arc::clone(&disposed) });
        let (seen, output) = collector();

        let connection = connectable.connect(Arc::clone(&output)).expect("connect");
        assert!(connectable.connect(output).is_err());
        connection.accept(());
        connection.dispose();

        assert_eq!(*seen.lock().expect("lock"), vec![1, 2]);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn merged_source_forwards_from_every_child() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let merged = MergedEventSource::from_sources([
            Arc::new(Replay { events: vec![1], disposed: Arc::clone(&disposed) })
                as Arc<dyn EventSource<u32>>,
            Arc::new(Replay { events: vec![2, 3], disposed: Arc::clone(&disposed) }),
        ]);
        let (seen, output) = collector();

        let subscription = merged.subscribe(output);
        subscription.dispose();

        assert_eq!(*seen.lock().expect("lock"), vec![1, 2, 3]);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    /// Source whose subscription counts disposals and optionally panics
    /// while disposing.
    struct Fragile {
        panics: bool,
        disposed: Arc<AtomicUsize>,
    }

    struct FragileSubscription {
        panics: bool,
        disposed: Arc<AtomicUsize>,
    }

    impl Disposable for FragileSubscription {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic::panic_any("unsubscribe failed");
            }
        }
    }

    impl EventSource<u32> for Fragile {
        fn subscribe(&self, _consumer: Arc<dyn Consumer<u32>>) -> Box<dyn Disposable> {
            Box::new(FragileSubscription { panics: self.panics, disposed: Arc::clone(&self.disposed) })
        }
    }

    proptest! {
        /// Every child is disposed exactly once, whichever children panic,
        /// and disposing the merged subscription again does nothing.
        #[test]
        fn prop_merged_dispose_releases_each_child_once(
            panics in prop::collection::vec(any::<bool>(), 0..12),
        ) {
            let counters: Vec<_> = panics.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let merged = MergedEventSource::from_sources(panics.iter().zip(&counters).map(
                |(panics, disposed)| {
                    Arc::new(Fragile { panics: *panics, disposed: Arc::clone(disposed) })
                        as Arc<dyn EventSource<u32>>
                },
            ));
            prop_assert_eq!(merged.len(), panics.len());
            prop_assert_eq!(merged.is_empty(), panics.is_empty());

            let (_seen, output) = collector();
            let subscription = merged.subscribe(output);
            subscription.dispose();
            subscription.dispose();

            for disposed in &counters {
                prop_assert_eq!(disposed.load(Ordering::SeqCst), 1);
            }
        }
    }

    #[test]
    fn noop_source_never_emits() {
        let (seen, output) = collector();
        let connection = Connectable::<(), u32>::connect(&NoopEventSource, Arc::clone(&output))
            .expect("connect");
        connection.accept(());
        connection.dispose();

        EventSource::<u32>::subscribe(&NoopEventSource, output).dispose();
        assert!(seen.lock().expect("lock").is_empty());
    }
}
