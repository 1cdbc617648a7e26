//! Logger hooks and the decorators that call them.
//!
//! A [`Logger`] observes every call to the transition functions. The
//! decorators [`LoggingInit`] and [`LoggingUpdate`] wrap an [`Init`] or
//! [`Update`] and invoke the hooks around each call. A panic escaping the
//! wrapped function is reported to the `exception_during_*` hook and then
//! resumed; decorators never swallow failures.

use std::{
    any::Any,
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{First, Init, Next, Update};

/// Observer hooks around [`Init`] and [`Update`] calls.
///
/// Every hook has a default implementation, so loggers override only what
/// they need. The default exception hooks log at `error` level.
pub trait Logger<M, E, F>: Send + Sync {
    /// Called before `init` with its argument.
    fn before_init(&self, _model: &M) {}

    /// Called after `init` returned.
    fn after_init(&self, _model: &M, _result: &First<M, F>) {}

    /// Called when `init` panicked, before the panic is resumed.
    fn exception_during_init(&self, _model: &M, message: &str) {
        tracing::error!("error initialising loop: {message}");
    }

    /// Called before `update` with its arguments.
    fn before_update(&self, _model: &M, _event: &E) {}

    /// Called after `update` returned.
    fn after_update(&self, _model: &M, _event: &E, _result: &Next<M, F>) {}

    /// Called when `update` panicked, before the panic is resumed.
    fn exception_during_update(&self, _model: &M, _event: &E, message: &str) {
        tracing::error!("error updating model: {message}");
    }
}

/// Logger that only reports failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl<M, E, F> Logger<M, E, F> for NoopLogger {}

/// Logger that traces every hook with `Debug` renderings of its arguments.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    tag: String,
}

impl TracingLogger {
    /// Create a logger whose records carry `tag` to tell loops apart.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl<M, E, F> Logger<M, E, F> for TracingLogger
where
    M: Debug,
    E: Debug,
    F: Debug,
{
    fn before_init(&self, model: &M) {
        tracing::debug!(tag = %self.tag, ?model, "initialising loop");
    }

    fn after_init(&self, model: &M, result: &First<M, F>) {
        tracing::debug!(
            tag = %self.tag,
            ?model,
            first = ?result.model(),
            effects = ?result.effects(),
            "loop initialised"
        );
    }

    fn exception_during_init(&self, model: &M, message: &str) {
        tracing::error!(tag = %self.tag, ?model, "error initialising loop: {message}");
    }

    fn before_update(&self, model: &M, event: &E) {
        tracing::debug!(tag = %self.tag, ?model, ?event, "updating model");
    }

    fn after_update(&self, model: &M, event: &E, result: &Next<M, F>) {
        tracing::debug!(
            tag = %self.tag,
            ?event,
            changed = result.has_model(),
            next = ?result.model_or(model),
            effects = ?result.effects(),
            "model updated"
        );
    }

    fn exception_during_update(&self, model: &M, event: &E, message: &str) {
        tracing::error!(tag = %self.tag, ?model, ?event, "error updating model: {message}");
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// [`Init`] decorator that reports calls to a [`Logger`].
pub struct LoggingInit<M, E, F> {
    init: Arc<dyn Init<M, F>>,
    logger: Arc<dyn Logger<M, E, F>>,
}

impl<M, E, F> LoggingInit<M, E, F> {
    /// Wrap `init`, reporting to `logger`.
    pub fn new(init: Arc<dyn Init<M, F>>, logger: Arc<dyn Logger<M, E, F>>) -> Self {
        Self { init, logger }
    }
}

impl<M, E, F> Init<M, F> for LoggingInit<M, E, F> {
    fn init(&self, model: &M) -> First<M, F> {
        self.logger.before_init(model);
        match panic::catch_unwind(AssertUnwindSafe(|| self.init.init(model))) {
            Ok(first) => {
                self.logger.after_init(model, &first);
                first
            },
            Err(payload) => {
                self.logger.exception_during_init(model, panic_message(payload.as_ref()));
                panic::resume_unwind(payload)
            },
        }
    }
}

/// [`Update`] decorator that reports calls to a [`Logger`].
pub struct LoggingUpdate<M, E, F> {
    update: Arc<dyn Update<M, E, F>>,
    logger: Arc<dyn Logger<M, E, F>>,
}

impl<M, E, F> LoggingUpdate<M, E, F> {
    /// Wrap `update`, reporting to `logger`.
    pub fn new(update: Arc<dyn Update<M, E, F>>, logger: Arc<dyn Logger<M, E, F>>) -> Self {
        Self { update, logger }
    }
}

impl<M, E, F> Update<M, E, F> for LoggingUpdate<M, E, F> {
    fn update(&self, model: &M, event: &E) -> Next<M, F> {
        self.logger.before_update(model, event);
        match panic::catch_unwind(AssertUnwindSafe(|| self.update.update(model, event))) {
            Ok(next) => {
                self.logger.after_update(model, event, &next);
                next
            },
            Err(payload) => {
                self.logger.exception_during_update(model, event, panic_message(payload.as_ref()));
                panic::resume_unwind(payload)
            },
        }
    }
}
