//! Loop assembly.
//!
//! [`LoopBuilder`] is an immutable template: every configuration method
//! returns a new builder and leaves the receiver untouched, so one builder
//! can be shared and used to start any number of loops. Execution contexts
//! are produced fresh for each started loop.

use std::sync::Arc;

use loopframe_core::{
    Connectable, EventSource, EventSourceConnectable, Init, Logger, LoggingInit, LoggingUpdate,
    MergedEventSource, NoopEventSource, NoopLogger, Update,
};

use crate::{ContextFactory, EventLoop, LoopError, LoopParts, context::default_pool_size};

/// Thread name prefix of the default event context.
pub const EVENT_THREAD_PREFIX: &str = "loopframe-event";

/// Thread name prefix of the default effect context.
pub const EFFECT_THREAD_PREFIX: &str = "loopframe-effect";

/// Starts loops.
pub trait LoopFactory<M, E, F>: Send + Sync {
    /// Start a loop from `model`.
    ///
    /// When an [`Init`] is configured it runs first and decides the actual
    /// starting model and effects. Otherwise the loop starts at `model` with
    /// no effects.
    ///
    /// # Errors
    ///
    /// - `LoopError::Spawn` if an execution context cannot be created
    /// - `LoopError::Connection` if the effect handler or event source
    ///   refuses to connect
    fn start_from(&self, model: M) -> Result<EventLoop<M, E, F>, LoopError>;

    /// Start a loop from `model` with explicit starting `effects`.
    ///
    /// # Errors
    ///
    /// - `LoopError::InvalidArgument` if an [`Init`] is configured, since
    ///   both would decide the starting effects
    /// - the errors of [`LoopFactory::start_from`]
    fn start_from_with_effects(
        &self,
        model: M,
        effects: Vec<F>,
    ) -> Result<EventLoop<M, E, F>, LoopError>;
}

impl<M, E, F, T> LoopFactory<M, E, F> for Arc<T>
where
    T: LoopFactory<M, E, F> + ?Sized,
{
    fn start_from(&self, model: M) -> Result<EventLoop<M, E, F>, LoopError> {
        (**self).start_from(model)
    }

    fn start_from_with_effects(
        &self,
        model: M,
        effects: Vec<F>,
    ) -> Result<EventLoop<M, E, F>, LoopError> {
        (**self).start_from_with_effects(model, effects)
    }
}

/// Immutable loop configuration.
///
/// Update and effect handler are required and given to [`LoopBuilder::new`].
/// Everything else has a default:
///
/// | Setting        | Default                                         |
/// |----------------|-------------------------------------------------|
/// | init           | none                                            |
/// | event source   | [`NoopEventSource`]                             |
/// | logger         | [`NoopLogger`]                                  |
/// | event context  | fresh sequential worker per loop                |
/// | effect context | fresh pool sized to the available parallelism   |
pub struct LoopBuilder<M, E, F> {
    update: Arc<dyn Update<M, E, F>>,
    effect_handler: Arc<dyn Connectable<F, E>>,
    init: Option<Arc<dyn Init<M, F>>>,
    event_source: Arc<dyn Connectable<M, E>>,
    logger: Arc<dyn Logger<M, E, F>>,
    event_context: ContextFactory,
    effect_context: ContextFactory,
}

impl<M, E, F> Clone for LoopBuilder<M, E, F> {
    fn clone(&self) -> Self {
        Self {
            update: Arc::clone(&self.update),
            effect_handler: Arc::clone(&self.effect_handler),
            init: self.init.clone(),
            event_source: Arc::clone(&self.event_source),
            logger: Arc::clone(&self.logger),
            event_context: self.event_context.clone(),
            effect_context: self.effect_context.clone(),
        }
    }
}

impl<M, E, F> LoopBuilder<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Builder with the required update function and effect handler.
    pub fn new(
        update: impl Update<M, E, F> + 'static,
        effect_handler: impl Connectable<F, E> + 'static,
    ) -> Self {
        Self {
            update: Arc::new(update),
            effect_handler: Arc::new(effect_handler),
            init: None,
            event_source: Arc::new(NoopEventSource),
            logger: Arc::new(NoopLogger),
            event_context: ContextFactory::sequential(EVENT_THREAD_PREFIX),
            effect_context: ContextFactory::pooled(EFFECT_THREAD_PREFIX, default_pool_size()),
        }
    }

    /// Copy with `init` run by [`LoopFactory::start_from`].
    #[must_use]
    pub fn init(&self, init: impl Init<M, F> + 'static) -> Self {
        Self { init: Some(Arc::new(init)), ..self.clone() }
    }

    /// Copy with `event_source` connected to every started loop.
    #[must_use]
    pub fn event_source(&self, event_source: impl Connectable<M, E> + 'static) -> Self {
        Self { event_source: Arc::new(event_source), ..self.clone() }
    }

    /// Copy with a subscribe-style `source` as the event source.
    #[must_use]
    pub fn subscribe_to(&self, source: impl EventSource<E> + 'static) -> Self {
        self.event_source(EventSourceConnectable::new(source))
    }

    /// Copy with `sources` merged into one event source.
    #[must_use]
    pub fn subscribe_to_all(
        &self,
        sources: impl IntoIterator<Item = Arc<dyn EventSource<E>>>,
    ) -> Self {
        self.subscribe_to(MergedEventSource::from_sources(sources))
    }

    /// Copy reporting `init` and `update` calls to `logger`.
    #[must_use]
    pub fn logger(&self, logger: impl Logger<M, E, F> + 'static) -> Self {
        Self { logger: Arc::new(logger), ..self.clone() }
    }

    /// Copy producing event contexts with `factory`.
    ///
    /// Updates are serialized only if the produced context runs one unit of
    /// work at a time.
    #[must_use]
    pub fn event_context(&self, factory: ContextFactory) -> Self {
        Self { event_context: factory, ..self.clone() }
    }

    /// Copy producing effect contexts with `factory`.
    #[must_use]
    pub fn effect_context(&self, factory: ContextFactory) -> Self {
        Self { effect_context: factory, ..self.clone() }
    }

    /// Whether an [`Init`] is configured.
    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    fn start(&self, model: M, effects: Vec<F>) -> Result<EventLoop<M, E, F>, LoopError> {
        let event_context = self.event_context.create()?;
        let effect_context = match self.effect_context.create() {
            Ok(context) => context,
            Err(err) => {
                event_context.dispose();
                return Err(err.into());
            },
        };

        let parts = LoopParts {
            update: Arc::new(LoggingUpdate::new(Arc::clone(&self.update), Arc::clone(&self.logger))),
            effect_handler: Arc::clone(&self.effect_handler),
            event_source: Arc::clone(&self.event_source),
            event_context,
            effect_context,
        };
        EventLoop::create(parts, model, effects)
    }
}

impl<M, E, F> LoopFactory<M, E, F> for LoopBuilder<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn start_from(&self, model: M) -> Result<EventLoop<M, E, F>, LoopError> {
        let Some(init) = &self.init else {
            return self.start(model, Vec::new());
        };

        let logging = LoggingInit::new(Arc::clone(init), Arc::clone(&self.logger));
        let (model, effects) = logging.init(&model).into_parts();
        self.start(model, effects)
    }

    fn start_from_with_effects(
        &self,
        model: M,
        effects: Vec<F>,
    ) -> Result<EventLoop<M, E, F>, LoopError> {
        if self.has_init() {
            return Err(LoopError::InvalidArgument(
                "starting effects cannot be combined with a configured init",
            ));
        }
        self.start(model, effects)
    }
}
