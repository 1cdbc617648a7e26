//! Connection contract.
//!
//! A [`Connectable`] is a factory for live [`Connection`]s. Connecting hands
//! the connectable an output [`Consumer`]; the returned connection receives
//! input values through [`Connection::accept`] and releases its resources on
//! [`Connection::dispose`].
//!
//! ```text
//!              connect(output)
//! ┌─────────────┐ ───────────> ┌────────────┐  output.accept(O)
//! │ Connectable │              │ Connection │ ─────────────────>
//! └─────────────┘              └────────────┘
//!                                 ^  accept(I) / dispose()
//!                                 │
//!                               owner
//! ```
//!
//! # Contract
//!
//! - The owner never calls `accept` after `dispose`.
//! - The owner disposes each connection at most once. Connections are not
//!   required to tolerate a second `dispose`.
//! - A connectable used by a loop allows one open connection at a time.
//!   [`ConnectionGuard`] implements that rule for built-in connectables and
//!   [`exclusive`] adds it to any connectable.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::ConnectionError;

/// Receiver of values produced by a connection or event source.
pub trait Consumer<T>: Send + Sync {
    /// Deliver one value.
    fn accept(&self, value: T);
}

impl<T, C> Consumer<T> for C
where
    C: Fn(T) + Send + Sync,
{
    fn accept(&self, value: T) {
        self(value);
    }
}

/// Handle to something that can be released.
pub trait Disposable: Send + Sync {
    /// Release the underlying resource.
    fn dispose(&self);
}

/// Live binding created by [`Connectable::connect`].
///
/// `accept` may be called from any thread chosen by the owner's execution
/// context, including several threads concurrently when the owner uses a
/// pooled context.
pub trait Connection<I>: Disposable {
    /// Feed one value into the connection.
    fn accept(&self, value: I);
}

/// Factory for live connections.
pub trait Connectable<I, O>: Send + Sync {
    /// Create a connection that forwards its outputs to `output`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::LimitExceeded` if this connectable only supports
    ///   one open connection and one is still open
    /// - `ConnectionError::Disposed` if the connectable can no longer connect
    fn connect(&self, output: Arc<dyn Consumer<O>>)
    -> Result<Box<dyn Connection<I>>, ConnectionError>;
}

impl<I, O, C> Connectable<I, O> for Arc<C>
where
    C: Connectable<I, O> + ?Sized,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        (**self).connect(output)
    }
}

/// Tracks whether a connectable has an open connection.
///
/// `acquire` claims the slot and returns a [`GuardRelease`] that frees it
/// again. Connections hold the release and call it from `dispose`.
#[derive(Debug)]
pub struct ConnectionGuard {
    name: &'static str,
    connected: Arc<AtomicBool>,
}

impl ConnectionGuard {
    /// Create an unclaimed guard. `name` is reported in errors.
    pub fn new(name: &'static str) -> Self {
        Self { name, connected: Arc::new(AtomicBool::new(false)) }
    }

    /// Claim the connection slot.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::LimitExceeded` if the slot is already claimed
    pub fn acquire(&self) -> Result<GuardRelease, ConnectionError> {
        if self.connected.swap(true, Ordering::AcqRel) {
            return Err(ConnectionError::LimitExceeded { connectable: self.name });
        }
        Ok(GuardRelease { connected: Arc::clone(&self.connected), released: AtomicBool::new(false) })
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Frees a [`ConnectionGuard`] slot. Releasing twice has no further effect.
#[derive(Debug)]
pub struct GuardRelease {
    connected: Arc<AtomicBool>,
    released: AtomicBool,
}

impl GuardRelease {
    /// Free the slot so the connectable can connect again.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.connected.store(false, Ordering::Release);
        }
    }
}

/// Restrict `connectable` to one open connection at a time.
pub fn exclusive<C>(connectable: C) -> Exclusive<C> {
    Exclusive { inner: connectable, guard: ConnectionGuard::new("exclusive connectable") }
}

/// Connectable wrapper created by [`exclusive`].
#[derive(Debug)]
pub struct Exclusive<C> {
    inner: C,
    guard: ConnectionGuard,
}

impl<C> Exclusive<C> {
    /// Whether the wrapped connectable currently has an open connection.
    pub fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }
}

impl<I, O, C> Connectable<I, O> for Exclusive<C>
where
    I: 'static,
    C: Connectable<I, O>,
{
    fn connect(
        &self,
        output: Arc<dyn Consumer<O>>,
    ) -> Result<Box<dyn Connection<I>>, ConnectionError> {
        let release = self.guard.acquire()?;
        match self.inner.connect(output) {
            Ok(inner) => Ok(Box::new(ExclusiveConnection { inner, release })),
            Err(err) => {
                release.release();
                Err(err)
            },
        }
    }
}

struct ExclusiveConnection<I> {
    inner: Box<dyn Connection<I>>,
    release: GuardRelease,
}

impl<I> Disposable for ExclusiveConnection<I> {
    fn dispose(&self) {
        self.inner.dispose();
        self.release.release();
    }
}

impl<I> Connection<I> for ExclusiveConnection<I> {
    fn accept(&self, value: I) {
        self.inner.accept(value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Echo;

    struct EchoConnection {
        output: Arc<dyn Consumer<u32>>,
    }

    impl Disposable for EchoConnection {
        fn dispose(&self) {}
    }

    impl Connection<u32> for EchoConnection {
        fn accept(&self, value: u32) {
            self.output.accept(value);
        }
    }

    impl Connectable<u32, u32> for Echo {
        fn connect(
            &self,
            output: Arc<dyn Consumer<u32>>,
        ) -> Result<Box<dyn Connection<u32>>, ConnectionError> {
            Ok(Box::new(EchoConnection { output }))
        }
    }

    #[test]
    fn guard_rejects_second_acquire() {
        let guard = ConnectionGuard::new("test");
        let release = guard.acquire().expect("first acquire");
        assert!(guard.is_connected());
        assert_eq!(
            guard.acquire().err(),
            Some(ConnectionError::LimitExceeded { connectable: "test" })
        );

        release.release();
        assert!(!guard.is_connected());
        assert!(guard.acquire().is_ok());
    }

    #[test]
    fn double_release_does_not_free_a_newer_claim() {
        let guard = ConnectionGuard::new("test");
        let first = guard.acquire().expect("first acquire");
        first.release();
        let _second = guard.acquire().expect("second acquire");

        first.release();
        assert!(guard.is_connected());
    }

    #[test]
    fn exclusive_limits_open_connections() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let output: Arc<dyn Consumer<u32>> =
            Arc::new(move |v: u32| sink.lock().expect("lock").push(v));

        let echo = exclusive(Echo);
        let connection = echo.connect(Arc::clone(&output)).expect("connect");
        assert!(echo.is_connected());
        assert!(matches!(
            echo.connect(Arc::clone(&output)),
            Err(ConnectionError::LimitExceeded { .. })
        ));

        connection.accept(4);
        connection.dispose();
        assert!(!echo.is_connected());

        let again = echo.connect(output).expect("reconnect after dispose");
        again.accept(5);
        assert_eq!(*seen.lock().expect("lock"), vec![4, 5]);
    }
}
