//! Loopframe runtime.
//!
//! Drives [`Update`](loopframe_core::Update) functions from `loopframe-core`
//! inside a serialized loop.
//!
//! # Components
//!
//! - [`ExecutionContext`]: where work runs (inline, one worker, a pool, or a
//!   tokio runtime)
//! - [`EventLoop`]: serialized event processing, effect dispatch and model
//!   publication
//! - [`LoopBuilder`] / [`LoopFactory`]: immutable loop configuration
//! - [`Controller`]: start/stop/restart cycles carrying the model forward
//!
//! # Example
//!
//! ```
//! use loopframe_core::{Next, connectables};
//! use loopframe_runtime::{ContextFactory, LoopBuilder, LoopFactory};
//!
//! let builder = LoopBuilder::new(
//!     |model: &u32, event: &u32| -> Next<u32, ()> { Next::next(model + event) },
//!     connectables::from_action::<(), u32, _>(|| {}),
//! )
//! .event_context(ContextFactory::immediate());
//!
//! let event_loop = builder.start_from(1).expect("start");
//! event_loop.dispatch_event(2).expect("dispatch");
//! assert_eq!(event_loop.most_recent_model(), 3);
//! event_loop.dispose();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod builder;
pub mod context;
mod controller;
mod error;
mod event_loop;

pub use builder::{EFFECT_THREAD_PREFIX, EVENT_THREAD_PREFIX, LoopBuilder, LoopFactory};
pub use context::{
    ContextFactory, ExecutionContext, ImmediateContext, PooledContext, SequentialContext,
    TokioContext, Work,
};
pub use controller::{Controller, ControllerState};
pub use error::{ControllerError, LoopError};
pub use event_loop::{EventLoop, LoopParts};
