//! Error types for loops and controllers.

use std::io;

use loopframe_core::ConnectionError;
use thiserror::Error;

use crate::ControllerState;

/// Errors raised by [`EventLoop`](crate::EventLoop) and
/// [`LoopFactory`](crate::LoopFactory).
#[derive(Error, Debug)]
pub enum LoopError {
    /// The loop was disposed and no longer accepts events or observers.
    #[error("loop has been disposed")]
    Disposed,

    /// The loop cannot be started with the given arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Connecting the effect handler or event source failed.
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// An execution context could not spawn its worker threads.
    #[error("failed to spawn execution context: {0}")]
    Spawn(#[from] io::Error),
}

/// Errors raised by [`Controller`](crate::Controller).
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The operation is not permitted in the controller's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// State the controller was in
        state: ControllerState,
        /// Operation that was rejected
        operation: &'static str,
    },

    /// Starting or observing the loop failed.
    #[error(transparent)]
    Loop(#[from] LoopError),

    /// `disconnect` was called with no view bound.
    #[error("no view is connected")]
    NotConnected,

    /// Binding the view failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
