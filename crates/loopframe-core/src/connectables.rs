//! Connectable adapters for trivial effect handlers.
//!
//! Each adapter allows one open connection at a time and does nothing on
//! disposal beyond freeing that slot.

use std::{marker::PhantomData, sync::Arc};

use crate::{
    Connectable, Connection, ConnectionError, ConnectionGuard, Consumer, Disposable, GuardRelease,
};

/// Run `action` for every input value. Never produces output.
pub fn from_action<I, O, A>(action: A) -> impl Connectable<I, O>
where
    I: Send + 'static,
    O: 'static,
    A: Fn() + Send + Sync + 'static,
{
    FnConnectable::new("action connectable", move |_value: I, _output: &dyn Consumer<O>| action())
}

/// Hand every input value to `consumer`. Never produces output.
pub fn from_consumer<I, O, C>(consumer: C) -> impl Connectable<I, O>
where
    I: Send + 'static,
    O: 'static,
    C: Fn(I) + Send + Sync + 'static,
{
    FnConnectable::new("consumer connectable", move |value: I, _output: &dyn Consumer<O>| {
        consumer(value);
    })
}

/// Map every input value through `function` and emit the result.
pub fn from_fn<I, O, F>(function: F) -> impl Connectable<I, O>
where
    I: Send + 'static,
    O: 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    FnConnectable::new("function connectable", move |value: I, output: &dyn Consumer<O>| {
        output.accept(function(value));
    })
}

/// Adapt the input side of `connectable`: values of type `J` are mapped
/// through `mapper` before reaching the inner connection.
pub fn contramap<J, I, O, C, G>(mapper: G, connectable: C) -> impl Connectable<J, O>
where
    J: 'static,
    I: 'static,
    O: 'static,
    C: Connectable<I, O>,
    G: Fn(J) -> I + Send + Sync + 'static,
{
    Contramap { mapper: Arc::new(mapper), inner: connectable, _marker: PhantomData }
}

type Handler<I, O> = dyn Fn(I, &dyn Consumer<O>) + Send + Sync;

struct FnConnectable<I, O> {
    handler: Arc<Handler<I, O>>,
    guard: ConnectionGuard,
}

impl<I, O> FnConnectable<I, O> {
    fn new(name: &'static str, handler: impl Fn(I, &dyn Consumer<O>) + Send + Sync + 'static) -> Self {
        Self { handler: Arc::new(handler), guard: ConnectionGuard::new(name) }
    }
}

impl<I, O> Connectable<I, O> for FnConnectable<I, O>
where
    I: Send + 'static,
    O: 'static,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        let release = self.guard.acquire()?;
        Ok(Box::new(FnConnection { handler: Arc::clone(&self.handler), output, release }))
    }
}

struct FnConnection<I, O> {
    handler: Arc<Handler<I, O>>,
    output: Arc<dyn Consumer<O>>,
    release: GuardRelease,
}

impl<I, O> Disposable for FnConnection<I, O> {
    fn dispose(&self) {
        self.release.release();
    }
}

impl<I, O> Connection<I> for FnConnection<I, O> {
    fn accept(&self, value: I) {
        (self.handler)(value, self.output.as_ref());
    }
}

struct Contramap<J, I, C> {
    mapper: Arc<dyn Fn(J) -> I + Send + Sync>,
    inner: C,
    _marker: PhantomData<fn(J) -> I>,
}

impl<J, I, O, C> Connectable<J, O> for Contramap<J, I, C>
where
    J: 'static,
    I: 'static,
    C: Connectable<I, O>,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<J>>, ConnectionError> {
        let inner = self.inner.connect(output)?;
        Ok(Box::new(ContramapConnection { mapper: Arc::clone(&self.mapper), inner }))
    }
}

struct ContramapConnection<J, I> {
    mapper: Arc<dyn Fn(J) -> I + Send + Sync>,
    inner: Box<dyn Connection<I>>,
}

impl<J, I> Disposable for ContramapConnection<J, I> {
    fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<J, I> Connection<J> for ContramapConnection<J, I> {
    fn accept(&self, value: J) {
        self.inner.accept((self.mapper)(value));
    }
}
