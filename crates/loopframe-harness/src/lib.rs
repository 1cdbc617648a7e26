//! Test doubles for Loopframe loops.
//!
//! Recording connectables and consumers, a manually driven event source and
//! a reference counter model. Integration tests and the fuzz target use
//! these to observe a loop from the outside without sleeping on fixed
//! timeouts: every recorder can block until an expected number of values
//! arrived.
//!
//! # Reference Model
//!
//! The `model` module holds a small counter domain with an `Arbitrary`
//! event type and a sequential reference fold. Applying the same events to
//! a real loop and to [`model::replay`] must yield the same final model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
mod recording;
mod source;
mod wait;

pub use recording::{RecordingConnectable, RecordingConsumer};
pub use source::{ManualEventSource, PanickingDisposeSource};
pub use wait::{DEFAULT_TIMEOUT, wait_until};
