//! Loop lifecycle across start/stop cycles.
//!
//! A [`Controller`] keeps a default model between runs. Each `start` builds a
//! fresh loop from that model; each `stop` disposes the loop and keeps its
//! last model as the new default, so the next run resumes where the previous
//! one ended.
//!
//! ```text
//!          start                           stop
//!  Idle ─────────> Starting ──> Running ─────────> Stopping ──> Idle ──> ... ──> Disposed
//!   │                                                           │
//!   └── replace_model / connect ────────────────────────────────┘
//! ```
//!
//! A view bound with [`Controller::connect`] receives every model of the
//! running loop on the model context, and its output events are dispatched
//! to the running loop.
//!
//! The state lock is never held while user code runs. Init, connectables and
//! the view run during the transient `Starting` and `Stopping` states, so a
//! view may call back into the controller; operations that do not fit the
//! transient state fail with `InvalidState`.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use arc_swap::{ArcSwap, ArcSwapOption};
use loopframe_core::{Connectable, Connection, ConnectionError, Consumer, Disposable, Init};

use crate::{ControllerError, EventLoop, ExecutionContext, ImmediateContext, LoopFactory};

/// Lifecycle state of a [`Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No loop is running. The controller may start.
    Idle,
    /// A loop is being built and connected.
    Starting,
    /// A loop is running.
    Running,
    /// The running loop is being disposed.
    Stopping,
    /// Terminal. Every operation fails.
    Disposed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

type RunningLoop<M, E, F> = Arc<ArcSwapOption<EventLoop<M, E, F>>>;

struct ControllerInner<M> {
    state: ControllerState,
    view: Option<Arc<dyn Connection<M>>>,
    observer: Option<Box<dyn Disposable>>,
}

/// Starts, stops and restarts loops built by a [`LoopFactory`].
pub struct Controller<M, E, F> {
    factory: Arc<dyn LoopFactory<M, E, F>>,
    init: Option<Arc<dyn Init<M, F>>>,
    model_context: Arc<dyn ExecutionContext>,
    default_model: ArcSwap<M>,
    running: RunningLoop<M, E, F>,
    inner: Mutex<ControllerInner<M>>,
}

impl<M, E, F> Controller<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    /// Idle controller starting loops from `factory` at `model`.
    pub fn new(factory: impl LoopFactory<M, E, F> + 'static, model: M) -> Self {
        Self {
            factory: Arc::new(factory),
            init: None,
            model_context: Arc::new(ImmediateContext::new()),
            default_model: ArcSwap::from_pointee(model),
            running: Arc::new(ArcSwapOption::empty()),
            inner: Mutex::new(ControllerInner {
                state: ControllerState::Idle,
                view: None,
                observer: None,
            }),
        }
    }

    /// Run `init` against the default model on every start.
    ///
    /// The factory must not have an init of its own; starting then fails
    /// with `LoopError::InvalidArgument`.
    #[must_use]
    pub fn with_init(mut self, init: impl Init<M, F> + 'static) -> Self {
        self.init = Some(Arc::new(init));
        self
    }

    /// Deliver models to the view on `context` instead of inline.
    #[must_use]
    pub fn with_model_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.model_context = context;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    /// Whether a loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load().is_some()
    }

    /// Latest model: the running loop's, or the default model while idle.
    pub fn model(&self) -> M {
        match self.running.load_full() {
            Some(event_loop) => event_loop.most_recent_model(),
            None => M::clone(&self.default_model.load()),
        }
    }

    /// Replace the default model the next start begins from.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::InvalidState` unless idle.
    pub fn replace_model(&self, model: M) -> Result<(), ControllerError> {
        let inner = self.lock();
        require_idle(inner.state, "replace the model")?;
        self.default_model.store(Arc::new(model));
        Ok(())
    }

    /// Start a loop from the default model.
    ///
    /// # Errors
    ///
    /// - `ControllerError::InvalidState` unless idle
    /// - `ControllerError::Loop` if the factory fails to start the loop; the
    ///   controller returns to idle
    pub fn start(&self) -> Result<(), ControllerError> {
        let view = {
            let mut inner = self.lock();
            require_idle(inner.state, "start")?;
            inner.state = ControllerState::Starting;
            inner.view.clone()
        };

        match self.launch(view) {
            Ok(observer) => {
                let mut inner = self.lock();
                inner.observer = observer;
                inner.state = ControllerState::Running;
                tracing::debug!("controller started");
                Ok(())
            },
            Err(err) => {
                self.lock().state = ControllerState::Idle;
                Err(err)
            },
        }
    }

    /// Build the loop, publish it and bind `view` to it.
    fn launch(
        &self,
        view: Option<Arc<dyn Connection<M>>>,
    ) -> Result<Option<Box<dyn Disposable>>, ControllerError> {
        let model = M::clone(&self.default_model.load());
        let event_loop = match &self.init {
            Some(init) => {
                let (model, effects) = init.init(&model).into_parts();
                self.factory.start_from_with_effects(model, effects)?
            },
            None => self.factory.start_from(model)?,
        };

        // published first so events the view emits during replay reach the loop
        let event_loop = Arc::new(event_loop);
        self.running.store(Some(Arc::clone(&event_loop)));

        let Some(view) = view else {
            return Ok(None);
        };
        let context = Arc::clone(&self.model_context);
        let observed = event_loop.observe(move |model: &M| {
            let view = Arc::clone(&view);
            let model = model.clone();
            context.post(Box::new(move || view.accept(model)));
        });
        match observed {
            Ok(handle) => Ok(Some(handle)),
            Err(err) => {
                self.running.store(None);
                event_loop.dispose();
                Err(err.into())
            },
        }
    }

    /// Dispose the running loop and keep its last model as the default.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::InvalidState` unless running.
    pub fn stop(&self) -> Result<(), ControllerError> {
        let observer = {
            let mut inner = self.lock();
            if inner.state != ControllerState::Running {
                return Err(ControllerError::InvalidState { state: inner.state, operation: "stop" });
            }
            inner.state = ControllerState::Stopping;
            inner.observer.take()
        };

        if let Some(observer) = observer {
            observer.dispose();
        }
        if let Some(event_loop) = self.running.load_full() {
            event_loop.dispose();
            self.default_model.store(Arc::new(event_loop.most_recent_model()));
        }
        self.running.store(None);

        self.lock().state = ControllerState::Idle;
        tracing::debug!("controller stopped");
        Ok(())
    }

    /// Stop, then start from the model the stopped loop ended with.
    ///
    /// # Errors
    ///
    /// The errors of [`Controller::stop`] and [`Controller::start`].
    pub fn restart(&self) -> Result<(), ControllerError> {
        self.stop()?;
        self.start()
    }

    /// Bind `view` to the controller.
    ///
    /// The view receives the models of every loop started afterwards, and its
    /// output events go to the running loop. Events emitted while idle are
    /// dropped with a warning.
    ///
    /// # Errors
    ///
    /// - `ControllerError::InvalidState` unless idle
    /// - `ControllerError::Connection` if a view is already bound or `view`
    ///   refuses to connect
    pub fn connect(&self, view: impl Connectable<M, E> + 'static) -> Result<(), ControllerError> {
        {
            let inner = self.lock();
            require_idle(inner.state, "connect a view")?;
            if inner.view.is_some() {
                return Err(view_bound());
            }
        }

        let output = Arc::new(ViewOutput { running: Arc::clone(&self.running) });
        let connection: Arc<dyn Connection<M>> = Arc::from(view.connect(output)?);

        let mut inner = self.lock();
        let refused = match require_idle(inner.state, "connect a view") {
            Err(err) => Some(err),
            Ok(()) if inner.view.is_some() => Some(view_bound()),
            Ok(()) => None,
        };
        if let Some(err) = refused {
            drop(inner);
            connection.dispose();
            return Err(err);
        }
        inner.view = Some(connection);
        Ok(())
    }

    /// Release the bound view.
    ///
    /// # Errors
    ///
    /// - `ControllerError::InvalidState` unless idle
    /// - `ControllerError::NotConnected` if no view is bound
    pub fn disconnect(&self) -> Result<(), ControllerError> {
        let view = {
            let mut inner = self.lock();
            require_idle(inner.state, "disconnect")?;
            inner.view.take().ok_or(ControllerError::NotConnected)?
        };
        view.dispose();
        Ok(())
    }

    /// Release the view and move to the terminal state.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::InvalidState` unless idle. A running
    /// controller must be stopped first.
    pub fn dispose(&self) -> Result<(), ControllerError> {
        let view = {
            let mut inner = self.lock();
            require_idle(inner.state, "dispose")?;
            inner.state = ControllerState::Disposed;
            inner.view.take()
        };
        if let Some(view) = view {
            view.dispose();
        }
        tracing::debug!("controller disposed");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M, E, F> Drop for Controller<M, E, F> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(observer) = inner.observer.take() {
            observer.dispose();
        }
        if let Some(event_loop) = self.running.swap(None) {
            event_loop.dispose();
        }
        if let Some(view) = inner.view.take() {
            view.dispose();
        }
    }
}

impl<M, E, F> fmt::Debug for Controller<M, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner).state;
        f.debug_struct("Controller").field("state", &state).finish_non_exhaustive()
    }
}

fn view_bound() -> ControllerError {
    ConnectionError::LimitExceeded { connectable: "controller view" }.into()
}

fn require_idle(state: ControllerState, operation: &'static str) -> Result<(), ControllerError> {
    match state {
        ControllerState::Idle => Ok(()),
        state => Err(ControllerError::InvalidState { state, operation }),
    }
}

/// Routes view output to whichever loop is running.
struct ViewOutput<M, E, F> {
    running: RunningLoop<M, E, F>,
}

impl<M, E, F> Consumer<E> for ViewOutput<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn accept(&self, event: E) {
        match self.running.load_full() {
            Some(event_loop) => {
                if event_loop.dispatch_event(event).is_err() {
                    tracing::warn!("dropping view event: loop is shutting down");
                }
            },
            None => tracing::warn!("dropping view event: controller is not running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use loopframe_core::{First, Next, NoopEventSource};

    use super::*;
    use crate::{ContextFactory, LoopBuilder, LoopError};

    fn counter() -> Controller<i64, i64, ()> {
        let builder = LoopBuilder::new(
            |model: &i64, event: &i64| -> Next<i64, ()> { Next::next(model + event) },
            NoopEventSource,
        )
        .event_context(ContextFactory::immediate())
        .effect_context(ContextFactory::immediate());
        Controller::new(builder, 10)
    }

    fn dispatch(controller: &Controller<i64, i64, ()>, event: i64) {
        let event_loop = controller.running.load_full().expect("running");
        event_loop.dispatch_event(event).expect("dispatch");
    }

    #[test]
    fn stop_keeps_last_model_as_default() {
        let controller = counter();

        controller.start().expect("start");
        dispatch(&controller, 5);
        controller.stop().expect("stop");

        assert_eq!(controller.model(), 15);
        controller.start().expect("start again");
        assert_eq!(controller.model(), 15);
    }

    #[test]
    fn lifecycle_violations_are_rejected() {
        let controller = counter();

        assert!(matches!(
            controller.stop(),
            Err(ControllerError::InvalidState { state: ControllerState::Idle, .. })
        ));
        controller.start().expect("start");
        assert!(matches!(controller.start(), Err(ControllerError::InvalidState { .. })));
        assert!(controller.replace_model(0).is_err());
        assert!(controller.dispose().is_err());

        controller.stop().expect("stop");
        controller.dispose().expect("dispose");
        assert_eq!(controller.state(), ControllerState::Disposed);
        assert!(controller.start().is_err());
        assert!(controller.dispose().is_err());
    }

    #[test]
    fn replace_model_changes_next_start() {
        let controller = counter();

        controller.replace_model(42).expect("replace");
        controller.start().expect("start");

        assert_eq!(controller.model(), 42);
    }

    #[test]
    fn init_runs_on_every_start() {
        let controller = counter().with_init(|model: &i64| First::first(model * 2));

        controller.start().expect("start");
        assert_eq!(controller.model(), 20);
        controller.restart().expect("restart");
        assert_eq!(controller.model(), 40);
    }

    #[test]
    fn init_conflicts_with_factory_init() {
        let builder = LoopBuilder::new(
            |_: &i64, _: &i64| -> Next<i64, ()> { Next::no_change() },
            NoopEventSource,
        )
        .init(|model: &i64| First::first(*model))
        .event_context(ContextFactory::immediate())
        .effect_context(ContextFactory::immediate());
        let controller = Controller::new(builder, 0).with_init(|model: &i64| First::first(*model));

        assert!(matches!(
            controller.start(),
            Err(ControllerError::Loop(LoopError::InvalidArgument(_)))
        ));
        assert!(!controller.is_running());
    }

    #[test]
    fn disconnect_without_view_fails() {
        let controller = counter();
        assert!(matches!(controller.disconnect(), Err(ControllerError::NotConnected)));
    }
}
