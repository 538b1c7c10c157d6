//! Server error types.

use std::fmt;

/// Errors that stop the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unparseable bind address).
    ///
    /// Fatal: prevents startup. Fix configuration and restart.
    Config(String),

    /// Transport error (bind failure, accept failure).
    ///
    /// Fatal for the runtime. Errors on individual client sockets never
    /// surface here; they evict the client instead.
    Transport(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
