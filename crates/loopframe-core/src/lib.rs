//! Core contracts for Loopframe loops.
//!
//! Pure types and traits shared by the runtime and by applications. Nothing
//! in this crate spawns threads or owns a loop.
//!
//! # Components
//!
//! - [`Update`] / [`Init`]: transition functions, producing [`Next`] and
//!   [`First`]
//! - [`Connectable`] / [`Connection`]: the contract every effect handler and
//!   event source satisfies
//! - [`connectables`]: adapters for trivial effect handlers
//! - [`EventSource`], [`EventSourceConnectable`], [`MergedEventSource`]:
//!   subscribe-style event producers
//! - [`Logger`], [`LoggingInit`], [`LoggingUpdate`]: observation hooks around
//!   the transition functions

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connectables;
mod connection;
mod error;
mod event_source;
mod logger;
mod next;
mod update;

pub use connection::{
    Connectable, Connection, ConnectionGuard, Consumer, Disposable, Exclusive, GuardRelease,
    exclusive,
};
pub use error::ConnectionError;
pub use event_source::{EventSource, EventSourceConnectable, MergedEventSource, NoopEventSource};
pub use logger::{Logger, LoggingInit, LoggingUpdate, NoopLogger, TracingLogger, panic_message};
pub use next::{First, Next};
pub use update::{Init, Update};
