//! Error types for the connection state machine.

use hearth_proto::ProtocolError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors raised by [`crate::Connection`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The peer sent bytes that are not valid protocol text
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
