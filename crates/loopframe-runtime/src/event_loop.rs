//! The serialized event loop.
//!
//! An [`EventLoop`] owns the current model and drives [`Update`] against the
//! events dispatched to it. Event processing runs on the event execution
//! context, effect dispatch on the effect execution context:
//!
//! ```text
//!  dispatch_event ──> event context ──> update ──> publish model ──> observers
//!        ^                                 │                    └──> event source
//!        │                                 v
//!   effect handler <── effect context <── effects
//! ```
//!
//! # Invariants
//!
//! - At most one `update` call is in flight, provided the event context is
//!   sequential. Events are applied in dispatch order.
//! - Models are published through an atomic swap; readers never observe a
//!   partially built model.
//! - The effect handler and event source connections are disposed exactly
//!   once, by the disposal path only.
//! - The disposed flag is raised before anything is released. Events still
//!   queued at that point are dropped without reaching `update`.

use std::{
    fmt,
    sync::{
        Arc, Mutex, OnceLock, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;
use loopframe_core::{Connectable, Connection, Consumer, Disposable, Update};

use crate::{ExecutionContext, LoopError};

/// The collaborators a loop is created from.
pub struct LoopParts<M, E, F> {
    /// Transition function applied to every event.
    pub update: Arc<dyn Update<M, E, F>>,
    /// Receives effects, emits events.
    pub effect_handler: Arc<dyn Connectable<F, E>>,
    /// Receives published models, emits events.
    pub event_source: Arc<dyn Connectable<M, E>>,
    /// Runs event processing. Must be sequential for serialized updates.
    pub event_context: Arc<dyn ExecutionContext>,
    /// Runs effect dispatch.
    pub effect_context: Arc<dyn ExecutionContext>,
}

/// Running loop. Cloning yields another handle to the same loop.
///
/// The loop is disposed by [`EventLoop::dispose`] or when the last handle is
/// dropped.
pub struct EventLoop<M, E, F> {
    inner: Arc<LoopInner<M, E, F>>,
}

impl<M, E, F> Clone for EventLoop<M, E, F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Published<M> {
    seq: u64,
    model: M,
}

type Callback<M> = Box<dyn Fn(&M) + Send + Sync>;

struct Observer<M> {
    id: u64,
    callback: Callback<M>,
    /// Sequence number of the newest model delivered, plus one.
    delivered: AtomicU64,
    removed: AtomicBool,
}

impl<M> Observer<M> {
    /// Deliver `published` unless a newer model already reached this
    /// observer.
    fn deliver(&self, published: &Published<M>) {
        if self.removed.load(Ordering::Acquire) {
            return;
        }
        let mark = published.seq + 1;
        if self.delivered.fetch_max(mark, Ordering::AcqRel) < mark {
            (self.callback)(&published.model);
        }
    }
}

struct LoopInner<M, E, F> {
    id: u64,
    update: Arc<dyn Update<M, E, F>>,
    model: ArcSwap<Published<M>>,
    disposed: AtomicBool,
    event_context: Arc<dyn ExecutionContext>,
    effect_context: Arc<dyn ExecutionContext>,
    effect_connection: OnceLock<Box<dyn Connection<F>>>,
    source_connection: OnceLock<Box<dyn Connection<M>>>,
    observers: Mutex<Vec<Arc<Observer<M>>>>,
    next_observer: AtomicU64,
}

/// Output consumer handed to the effect handler and event source.
struct EventIntake<M, E, F> {
    inner: Weak<LoopInner<M, E, F>>,
}

impl<M, E, F> Consumer<E> for EventIntake<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn accept(&self, event: E) {
        let Some(inner) = self.inner.upgrade() else {
            tracing::trace!("dropping event for dropped loop");
            return;
        };
        if inner.dispatch(event).is_err() {
            tracing::trace!(loop_id = inner.id, "dropping event emitted after disposal");
        }
    }
}

impl<M, E, F> EventLoop<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Connect `parts` and start a loop at `model`.
    ///
    /// The effect handler is connected first, then the event source. The
    /// event source receives `model`, and `effects` are dispatched to the
    /// effect handler before any event is processed.
    ///
    /// # Errors
    ///
    /// Returns `LoopError::Connection` if either connectable refuses to
    /// connect. Everything connected so far is released, including both
    /// execution contexts.
    pub fn create(parts: LoopParts<M, E, F>, model: M, effects: Vec<F>) -> Result<Self, LoopError> {
        static NEXT_LOOP: AtomicU64 = AtomicU64::new(1);

        let LoopParts { update, effect_handler, event_source, event_context, effect_context } = parts;
        let inner = Arc::new(LoopInner {
            id: NEXT_LOOP.fetch_add(1, Ordering::Relaxed),
            update,
            model: ArcSwap::from_pointee(Published { seq: 0, model }),
            disposed: AtomicBool::new(false),
            event_context,
            effect_context,
            effect_connection: OnceLock::new(),
            source_connection: OnceLock::new(),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        });

        if let Err(err) = inner.connect(effect_handler.as_ref(), event_source.as_ref()) {
            tracing::debug!(loop_id = inner.id, %err, "loop failed to connect");
            inner.dispose();
            return Err(err);
        }

        if let Some(source) = inner.source_connection.get() {
            source.accept(inner.model.load().model.clone());
        }
        for effect in effects {
            inner.dispatch_effect(effect);
        }

        tracing::debug!(loop_id = inner.id, "loop created");
        Ok(Self { inner })
    }

    /// Queue `event` for processing.
    ///
    /// # Errors
    ///
    /// Returns `LoopError::Disposed` once the loop is disposed. The event is
    /// discarded.
    pub fn dispatch_event(&self, event: E) -> Result<(), LoopError> {
        self.inner.dispatch(event)
    }

    /// Register `callback` for every published model.
    ///
    /// The current model is delivered synchronously before this returns.
    /// Later models are delivered on the event context. A callback never sees
    /// an older model after a newer one. Disposing the returned handle
    /// unregisters the callback, and may be done from inside the callback.
    ///
    /// # Errors
    ///
    /// Returns `LoopError::Disposed` once the loop is disposed.
    pub fn observe(
        &self,
        callback: impl Fn(&M) + Send + Sync + 'static,
    ) -> Result<Box<dyn Disposable>, LoopError> {
        let inner = &self.inner;
        let observer = Arc::new(Observer {
            id: inner.next_observer.fetch_add(1, Ordering::Relaxed),
            callback: Box::new(callback),
            delivered: AtomicU64::new(0),
            removed: AtomicBool::new(false),
        });

        {
            let mut observers = inner.observers.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.is_disposed() {
                return Err(LoopError::Disposed);
            }
            observers.push(Arc::clone(&observer));
        }

        observer.deliver(&inner.model.load());
        Ok(Box::new(ObserverHandle { inner: Arc::downgrade(inner), observer }))
    }

    /// Latest published model. Safe to call from any thread, also after
    /// disposal.
    pub fn most_recent_model(&self) -> M {
        self.inner.model.load().model.clone()
    }
}

impl<M, E, F> EventLoop<M, E, F> {
    /// Whether the loop has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Stop the loop and release its connections and contexts.
    ///
    /// Blocks until queued effects have been handed to the effect handler,
    /// except when called from work running on one of the loop's own
    /// contexts. Concurrent and repeated calls are no-ops.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<M, E, F> fmt::Debug for EventLoop<M, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("id", &self.inner.id)
            .field("disposed", &self.inner.is_disposed())
            .finish_non_exhaustive()
    }
}

impl<M, E, F> LoopInner<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn connect(
        self: &Arc<Self>,
        effect_handler: &dyn Connectable<F, E>,
        event_source: &dyn Connectable<M, E>,
    ) -> Result<(), LoopError> {
        let effects = effect_handler.connect(Arc::new(EventIntake { inner: Arc::downgrade(self) }))?;
        // fresh cells, both sets succeed
        let _ = self.effect_connection.set(effects);

        let source = event_source.connect(Arc::new(EventIntake { inner: Arc::downgrade(self) }))?;
        let _ = self.source_connection.set(source);
        Ok(())
    }

    fn dispatch(self: &Arc<Self>, event: E) -> Result<(), LoopError> {
        if self.is_disposed() {
            return Err(LoopError::Disposed);
        }
        let weak = Arc::downgrade(self);
        self.event_context.post(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.process_event(&event);
            }
        }));
        Ok(())
    }

    fn process_event(self: &Arc<Self>, event: &E) {
        if self.is_disposed() {
            tracing::trace!(loop_id = self.id, "dropping event queued before disposal");
            return;
        }

        let current = self.model.load_full();
        let (model, effects) = self.update.update(&current.model, event).into_parts();

        if let Some(model) = model {
            self.publish(current.seq + 1, model);
        }
        for effect in effects {
            self.dispatch_effect(effect);
        }
    }

    fn publish(&self, seq: u64, model: M) {
        let published = Arc::new(Published { seq, model });
        self.model.store(Arc::clone(&published));

        let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for observer in observers {
            observer.deliver(&published);
        }

        if !self.is_disposed()
            && let Some(source) = self.source_connection.get()
        {
            source.accept(published.model.clone());
        }
    }

    fn dispatch_effect(self: &Arc<Self>, effect: F) {
        if self.is_disposed() {
            tracing::trace!(loop_id = self.id, "dropping effect produced after disposal");
            return;
        }
        let weak = Arc::downgrade(self);
        self.effect_context.post(Box::new(move || {
            if let Some(inner) = weak.upgrade()
                && let Some(connection) = inner.effect_connection.get()
            {
                connection.accept(effect);
            }
        }));
    }
}

impl<M, E, F> LoopInner<M, E, F> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.event_context.dispose();
        if let Some(source) = self.source_connection.get() {
            source.dispose();
        }
        self.effect_context.dispose();
        if let Some(effects) = self.effect_connection.get() {
            effects.dispose();
        }
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).clear();

        tracing::debug!(loop_id = self.id, "loop disposed");
    }
}

impl<M, E, F> Drop for LoopInner<M, E, F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct ObserverHandle<M, E, F> {
    inner: Weak<LoopInner<M, E, F>>,
    observer: Arc<Observer<M>>,
}

impl<M, E, F> Disposable for ObserverHandle<M, E, F>
where
    M: Send + Sync,
    E: Send,
    F: Send,
{
    fn dispose(&self) {
        self.observer.removed.store(true, Ordering::Release);
        if let Some(inner) = self.inner.upgrade() {
            let id = self.observer.id;
            inner
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|observer| observer.id != id);
        }
    }
}
