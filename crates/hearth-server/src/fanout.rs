//! Broadcast fan-out.
//!
//! Delivers one line to a set of recipients, one after another. The set is
//! snapshotted before the first write and the line is encoded once. When a
//! write fails the peer is evicted on the spot through the driver (it leaves
//! its room and its session is removed) and the pass carries on with the
//! remaining recipients. No acknowledgment, no retry.

use bytes::Bytes;
use hearth_core::{ConnectionId, Environment};
use hearth_proto::ServerLine;

use crate::{
    driver::{ServerAction, ServerDriver, ServerEvent},
    server_error::DeliveryError,
};

/// Destination for encoded lines: the TCP peers in production, an in-memory
/// transport in simulation.
pub trait LineSink {
    /// Hand `line` to the transport of `connection`.
    ///
    /// Must not block. An error means the peer cannot be written to anymore.
    fn send_line(&mut self, connection: ConnectionId, line: &Bytes) -> Result<(), DeliveryError>;

    /// Release the transport of `connection`. Lines already handed over may
    /// still be flushed.
    fn close(&mut self, connection: ConnectionId, reason: &str);
}

/// Result of one delivery pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutOutcome {
    /// Recipients the line was handed to
    pub delivered: usize,
    /// Recipients whose write failed, in pass order
    pub evicted: Vec<ConnectionId>,
    /// Actions produced by the evictions (departure notices, leader
    /// announcements, closes), to be executed after this pass
    pub follow_up: Vec<ServerAction>,
}

/// One delivery pass over a driver's recipients.
pub struct Fanout<'a, E: Environment, S: LineSink> {
    driver: &'a mut ServerDriver<E>,
    sink: &'a mut S,
}

impl<'a, E: Environment, S: LineSink> Fanout<'a, E, S> {
    /// Pass over `driver`'s state writing into `sink`.
    pub fn new(driver: &'a mut ServerDriver<E>, sink: &'a mut S) -> Self {
        Self { driver, sink }
    }

    /// Every member of `room` except `exclude`.
    pub fn to_room(&mut self, room: &str, line: &ServerLine, exclude: Option<ConnectionId>) -> FanoutOutcome {
        let recipients = self.driver.room_recipients(room, exclude);
        self.deliver(recipients, line)
    }

    /// Every registered connection except `exclude`.
    pub fn to_all(&mut self, line: &ServerLine, exclude: Option<ConnectionId>) -> FanoutOutcome {
        let recipients = self.driver.all_recipients(exclude);
        self.deliver(recipients, line)
    }

    /// A single connection, registered or not.
    pub fn to_connection(&mut self, connection: ConnectionId, line: &ServerLine) -> FanoutOutcome {
        self.deliver(vec![connection], line)
    }

    fn deliver(&mut self, recipients: Vec<ConnectionId>, line: &ServerLine) -> FanoutOutcome {
        let encoded = line.encode();
        let mut outcome = FanoutOutcome::default();

        for connection in recipients {
            let Err(e) = self.sink.send_line(connection, &encoded) else {
                outcome.delivered += 1;
                continue;
            };

            tracing::warn!(%connection, error = %e, "delivery failed, evicting peer");
            let event = ServerEvent::DeliveryFailed { connection, reason: e.to_string() };
            match self.driver.process_event(event) {
                Ok(actions) => outcome.follow_up.extend(actions),
                Err(e) => tracing::error!(%connection, error = %e, "eviction failed"),
            }
            outcome.evicted.push(connection);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;

    use super::*;
    use crate::driver::DriverConfig;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = std::time::Instant;

        #[allow(clippy::disallowed_methods)]
        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Vec<(ConnectionId, Bytes)>,
        failing: HashSet<ConnectionId>,
    }

    impl LineSink for RecordingSink {
        fn send_line(&mut self, connection: ConnectionId, line: &Bytes) -> Result<(), DeliveryError> {
            if self.failing.contains(&connection) {
                return Err(DeliveryError::PeerGone(connection));
            }
            self.delivered.push((connection, line.clone()));
            Ok(())
        }

        fn close(&mut self, _connection: ConnectionId, _reason: &str) {}
    }

    fn room_of_four() -> ServerDriver<TestEnv> {
        let mut driver = ServerDriver::new(TestEnv, DriverConfig::default());
        for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            let connection = ConnectionId::new(id);
            driver.process_event(ServerEvent::ConnectionAccepted { connection }).unwrap();
            let bytes = Bytes::from(format!("{name}\n/join lobby\n"));
            driver.process_event(ServerEvent::BytesReceived { connection, bytes }).unwrap();
        }
        driver
    }

    #[test]
    fn failed_recipient_does_not_stop_the_pass() {
        let mut driver = room_of_four();
        let mut sink = RecordingSink::default();
        sink.failing.insert(ConnectionId::new(2));

        let line = ServerLine::raw("hello");
        let outcome = Fanout::new(&mut driver, &mut sink).to_room("lobby", &line, Some(ConnectionId::new(1)));

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.evicted, vec![ConnectionId::new(2)]);
        let recipients: Vec<u64> = sink.delivered.iter().map(|(c, _)| c.get()).collect();
        assert_eq!(recipients, vec![3, 4]);
        assert!(sink.delivered.iter().all(|(_, bytes)| &bytes[..] == b"hello\n"));

        assert!(!driver.registry().is_registered(ConnectionId::new(2)));
        assert_eq!(driver.room_recipients("lobby", None).len(), 3);
        assert!(outcome.follow_up.iter().any(|action| matches!(
            action,
            ServerAction::CloseConnection { connection, .. } if connection.get() == 2
        )));
    }

    #[test]
    fn every_failure_is_evicted() {
        let mut driver = room_of_four();
        let mut sink = RecordingSink::default();
        sink.failing.extend([ConnectionId::new(1), ConnectionId::new(4)]);

        let outcome = Fanout::new(&mut driver, &mut sink).to_all(&ServerLine::raw("notice"), None);

        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.evicted, vec![ConnectionId::new(1), ConnectionId::new(4)]);
        assert_eq!(driver.registry().session_count(), 2);
        assert_eq!(driver.directory().current_leader("lobby").unwrap().username, "b");
    }

    #[test]
    fn unknown_room_delivers_nothing() {
        let mut driver = room_of_four();
        let mut sink = RecordingSink::default();

        let outcome = Fanout::new(&mut driver, &mut sink).to_room("attic", &ServerLine::raw("x"), None);
        assert_eq!(outcome, FanoutOutcome::default());
    }
}
