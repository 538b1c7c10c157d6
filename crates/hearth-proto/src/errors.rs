//! Error types for the line protocol.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding the line protocol.
///
/// Unknown tags and malformed server lines are not errors; they decode to
/// [`crate::ServerLine::Raw`]. Only bytes that cannot be text are rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A complete line was not valid UTF-8
    #[error("line is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        /// Length of the longest valid prefix
        valid_up_to: usize,
    },
}
