//! In-memory transport.
//!
//! Every connection gets an inbox of the lines delivered to it. Writes to a
//! connection can be broken on demand to exercise eviction.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use hearth_core::ConnectionId;
use hearth_server::{DeliveryError, LineSink};

/// [`LineSink`] that records lines instead of writing them.
#[derive(Debug, Default)]
pub struct SimTransport {
    inboxes: HashMap<ConnectionId, Vec<String>>,
    broken: HashSet<ConnectionId>,
    closed: HashMap<ConnectionId, String>,
}

impl SimTransport {
    /// No connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting lines for `connection`.
    pub fn open(&mut self, connection: ConnectionId) {
        self.inboxes.entry(connection).or_default();
    }

    /// Make every later write to `connection` fail.
    pub fn break_writes(&mut self, connection: ConnectionId) {
        self.broken.insert(connection);
    }

    /// Drain the lines delivered to `connection`, without terminators.
    pub fn take_lines(&mut self, connection: ConnectionId) -> Vec<String> {
        self.inboxes.get_mut(&connection).map(std::mem::take).unwrap_or_default()
    }

    /// Why `connection` was closed, if it was.
    pub fn close_reason(&self, connection: ConnectionId) -> Option<&str> {
        self.closed.get(&connection).map(String::as_str)
    }

    /// Whether the server closed `connection`.
    pub fn is_closed(&self, connection: ConnectionId) -> bool {
        self.closed.contains_key(&connection)
    }
}

impl LineSink for SimTransport {
    fn send_line(&mut self, connection: ConnectionId, line: &Bytes) -> Result<(), DeliveryError> {
        if self.broken.contains(&connection) || self.closed.contains_key(&connection) {
            return Err(DeliveryError::PeerGone(connection));
        }
        let inbox = self.inboxes.get_mut(&connection).ok_or(DeliveryError::UnknownConnection(connection))?;

        let text = String::from_utf8_lossy(line);
        inbox.push(text.strip_suffix('\n').unwrap_or(&text).to_string());
        Ok(())
    }

    fn close(&mut self, connection: ConnectionId, reason: &str) {
        self.closed.entry(connection).or_insert_with(|| reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_lines_without_terminator() {
        let mut transport = SimTransport::new();
        let connection = ConnectionId::new(1);
        transport.open(connection);

        transport.send_line(connection, &Bytes::from_static(b"SYS 1 hi\n")).unwrap();

        assert_eq!(transport.take_lines(connection), vec!["SYS 1 hi"]);
        assert!(transport.take_lines(connection).is_empty());
    }

    #[test]
    fn broken_and_closed_peers_fail() {
        let mut transport = SimTransport::new();
        let (a, b) = (ConnectionId::new(1), ConnectionId::new(2));
        transport.open(a);
        transport.open(b);

        transport.break_writes(a);
        transport.close(b, "bye");

        let line = Bytes::from_static(b"x\n");
        assert_eq!(transport.send_line(a, &line), Err(DeliveryError::PeerGone(a)));
        assert_eq!(transport.send_line(b, &line), Err(DeliveryError::PeerGone(b)));
        assert_eq!(transport.close_reason(b), Some("bye"));
        assert!(!transport.is_closed(a));
    }

    #[test]
    fn unknown_peer_fails() {
        let mut transport = SimTransport::new();
        let c = ConnectionId::new(9);
        assert_eq!(
            transport.send_line(c, &Bytes::from_static(b"x\n")),
            Err(DeliveryError::UnknownConnection(c))
        );
    }
}
