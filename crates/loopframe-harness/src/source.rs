//! Event sources driven by the test.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use loopframe_core::{Consumer, Disposable, EventSource};

type Subscribers<E> = Mutex<Vec<(u64, Arc<dyn Consumer<E>>)>>;

struct SourceState<E> {
    subscribers: Subscribers<E>,
    next_id: AtomicU64,
    unsubscribes: AtomicUsize,
}

/// Event source whose events are emitted by the test.
///
/// Clones share subscribers, so a test keeps one handle and gives another to
/// the loop.
pub struct ManualEventSource<E> {
    state: Arc<SourceState<E>>,
}

impl<E> Clone for ManualEventSource<E> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<E> Default for ManualEventSource<E> {
    fn default() -> Self {
        Self {
            state: Arc::new(SourceState {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                unsubscribes: AtomicUsize::new(0),
            }),
        }
    }
}

impl<E: Clone + Send + 'static> ManualEventSource<E> {
    /// Source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every current subscriber. Returns how many
    /// received it.
    pub fn emit(&self, event: E) -> usize {
        let subscribers: Vec<_> = self
            .state
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, consumer)| Arc::clone(consumer))
            .collect();

        for consumer in &subscribers {
            consumer.accept(event.clone());
        }
        subscribers.len()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of subscriptions disposed so far.
    pub fn unsubscribe_count(&self) -> usize {
        self.state.unsubscribes.load(Ordering::SeqCst)
    }
}

impl<E: Send + 'static> EventSource<E> for ManualEventSource<E> {
    fn subscribe(&self, consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push((id, consumer));
        Box::new(ManualSubscription { state: Arc::clone(&self.state), id })
    }
}

struct ManualSubscription<E> {
    state: Arc<SourceState<E>>,
    id: u64,
}

impl<E: Send> Disposable for ManualSubscription<E> {
    fn dispose(&self) {
        self.state
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
        self.state.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Event source whose subscriptions panic when disposed.
///
/// Used to check that merged sources still release their other children.
#[derive(Clone, Default)]
pub struct PanickingDisposeSource {
    attempts: Arc<AtomicUsize>,
}

impl PanickingDisposeSource {
    /// New source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dispose attempts on its subscriptions.
    pub fn dispose_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl<E> EventSource<E> for PanickingDisposeSource {
    fn subscribe(&self, _consumer: Arc<dyn Consumer<E>>) -> Box<dyn Disposable> {
        Box::new(PanickingSubscription { attempts: Arc::clone(&self.attempts) })
    }
}

struct PanickingSubscription {
    attempts: Arc<AtomicUsize>,
}

impl Disposable for PanickingSubscription {
    #[allow(clippy::panic, reason = "Disposal failure is the point of this double")]
    fn dispose(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        panic!("subscription refused to dispose");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingConsumer;

    #[test]
    fn emits_to_live_subscribers_only() {
        let source = ManualEventSource::<u8>::new();
        let first = RecordingConsumer::<u8>::new();
        let second = RecordingConsumer::<u8>::new();

        let first_sub = source.subscribe(Arc::new(first.clone()));
        let _second_sub = source.subscribe(Arc::new(second.clone()));
        assert_eq!(source.emit(1), 2);

        first_sub.dispose();
        assert_eq!(source.emit(2), 1);

        assert_eq!(first.values(), vec![1]);
        assert_eq!(second.values(), vec![1, 2]);
        assert_eq!(source.unsubscribe_count(), 1);
    }
}
