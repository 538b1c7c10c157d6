//! Hearth core: connection lifecycle and shared primitives.
//!
//! Everything here is a pure state machine with no I/O. Time comes in through
//! [`Environment`] so the same logic runs on real clocks in production and on a
//! manually advanced clock in simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod connection;
pub mod env;
pub mod error;
pub mod id;

pub use clock::LogicalClock;
pub use connection::{Connection, ConnectionState, Inbound};
pub use env::Environment;
pub use error::ConnectionError;
pub use id::{ConnectionId, SessionId};
