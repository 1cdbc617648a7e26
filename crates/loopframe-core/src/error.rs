//! Error types for the connection contract.

use thiserror::Error;

/// Errors raised when connecting a [`Connectable`](crate::Connectable).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A previous connection from the same connectable is still open.
    #[error("connection limit exceeded: {connectable} is already connected")]
    LimitExceeded {
        /// Name of the connectable that refused the connection
        connectable: &'static str,
    },

    /// The connectable's owner was disposed and no longer accepts connections.
    #[error("cannot connect: {0} has been disposed")]
    Disposed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_connectable() {
        let err = ConnectionError::LimitExceeded { connectable: "effect handler" };
        assert_eq!(err.to_string(), "connection limit exceeded: effect handler is already connected");

        let err = ConnectionError::Disposed("controller");
        assert_eq!(err.to_string(), "cannot connect: controller has been disposed");
    }
}
