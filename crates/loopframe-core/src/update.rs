//! Transition function traits.
//!
//! Both traits are implemented for plain closures, so most applications pass
//! a `fn` or closure straight to the builder.

use crate::{First, Next};

/// Pure state transition: `(model, event) -> Next`.
///
/// Called on the loop's event context, one invocation at a time. Must not
/// block on the loop it belongs to.
pub trait Update<M, E, F>: Send + Sync {
    /// Apply `event` to `model`.
    fn update(&self, model: &M, event: &E) -> Next<M, F>;
}

impl<M, E, F, T> Update<M, E, F> for T
where
    T: Fn(&M, &E) -> Next<M, F> + Send + Sync,
{
    fn update(&self, model: &M, event: &E) -> Next<M, F> {
        self(model, event)
    }
}

/// Pure initializer: `model -> First`.
///
/// Runs once per loop start, before the loop is created.
pub trait Init<M, F>: Send + Sync {
    /// Compute the starting model and effects from `model`.
    fn init(&self, model: &M) -> First<M, F>;
}

impl<M, F, T> Init<M, F> for T
where
    T: Fn(&M) -> First<M, F> + Send + Sync,
{
    fn init(&self, model: &M) -> First<M, F> {
        self(model)
    }
}
