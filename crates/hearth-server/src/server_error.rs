//! Driver and delivery error types.

use std::fmt;

use hearth_core::ConnectionId;

/// Errors returned by [`crate::ServerDriver::process_event`].
///
/// Both indicate the runtime and the driver disagree about which connections
/// exist. The event is dropped; driver state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Event names a connection the driver does not know (never accepted, or
    /// already closed).
    ConnectionNotFound(ConnectionId),

    /// Accept for a connection id that is already open. Connection ids must
    /// be unique; this is a runtime bug.
    ConnectionExists(ConnectionId),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionNotFound(id) => write!(f, "connection not found: {id}"),
            Self::ConnectionExists(id) => write!(f, "connection already exists: {id}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// A line could not be handed to a peer's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer's outbound path is broken (write failed, socket closed).
    ///
    /// Permanent: the fan-out evicts the peer.
    PeerGone(ConnectionId),

    /// The transport has no such connection.
    UnknownConnection(ConnectionId),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerGone(id) => write!(f, "peer {id} is gone"),
            Self::UnknownConnection(id) => write!(f, "no transport for connection {id}"),
        }
    }
}

impl std::error::Error for DeliveryError {}
