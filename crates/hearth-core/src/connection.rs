//! Per-connection state machine.
//!
//! Owns the connection's line decoder and turns raw bytes into inbound items.
//! The first line a connection ever sends is its username; every later line
//! is a command. Registry and room bookkeeping live in the server; this type
//! only tracks which phase the connection is in and rejects transitions that
//! skip one.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐ username ┌───────┐  join   ┌────────┐
//! │ Connecting │─────────>│ Lobby │────────>│ InRoom │──┐
//! └────────────┘          └───────┘         └────────┘<─┘ join (switch)
//!       │                     │                  │
//!       │  EOF / read error / QUIT / failed write│
//!       ↓                     ↓                  ↓
//!  ┌────────────────────────────────────────────────┐
//!  │                     Closed                     │
//!  └────────────────────────────────────────────────┘
//! ```

use std::{ops::Sub, time::Duration};

use hearth_proto::{Command, LineDecoder};

use crate::{error::ConnectionError, id::ConnectionId};

/// Connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, username line not yet processed
    Connecting,
    /// Registered, not in any room
    Lobby,
    /// Registered and a member of exactly one room
    InRoom,
    /// Closed (graceful or error)
    Closed,
}

/// What a complete line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The connection's first line, untrimmed
    Register(String),
    /// A later, non-blank line
    Command(Command),
}

/// Connection state machine
///
/// Pure: no I/O. Time is passed in by the caller. Generic over the instant
/// type so simulations can drive it with virtual time.
#[derive(Debug)]
pub struct Connection<I> {
    id: ConnectionId,
    state: ConnectionState,
    decoder: LineDecoder,
    /// Set once the first line has been handed out as `Register`
    username_seen: bool,
    opened_at: I,
    last_activity: I,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// New connection in `Connecting`.
    pub fn new(id: ConnectionId, now: I) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
            decoder: LineDecoder::new(),
            username_seen: false,
            opened_at: now,
            last_activity: now,
        }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current phase.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Time since the connection was accepted.
    pub fn age(&self, now: I) -> Duration {
        now - self.opened_at
    }

    /// Time since bytes last arrived.
    pub fn idle_for(&self, now: I) -> Duration {
        now - self.last_activity
    }

    /// Bytes held for an unterminated line.
    pub fn pending_bytes(&self) -> usize {
        self.decoder.pending()
    }

    /// Feed bytes read from the transport.
    ///
    /// Returns the items completed by this chunk in arrival order. The first
    /// line ever completed comes back as [`Inbound::Register`] even if it is
    /// blank; later blank lines are dropped.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if the connection is closed
    /// - `ConnectionError::Protocol` if a completed line is not UTF-8
    pub fn receive(&mut self, bytes: &[u8], now: I) -> Result<Vec<Inbound>, ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "receive" });
        }
        self.last_activity = now;

        let lines = self.decoder.feed(bytes)?;
        let mut inbound = Vec::with_capacity(lines.len());
        for line in lines {
            if !self.username_seen {
                self.username_seen = true;
                inbound.push(Inbound::Register(line));
            } else if let Some(command) = Command::parse(&line) {
                inbound.push(Inbound::Command(command));
            }
        }

        Ok(inbound)
    }

    /// `Connecting → Lobby`, once the registry accepted the username.
    pub fn register(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Lobby;
                Ok(())
            },
            state => Err(ConnectionError::InvalidState { state, operation: "register" }),
        }
    }

    /// `Lobby | InRoom → InRoom`, once the room directory accepted a join.
    pub fn enter_room(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Lobby | ConnectionState::InRoom => {
                self.state = ConnectionState::InRoom;
                Ok(())
            },
            state => Err(ConnectionError::InvalidState { state, operation: "enter room" }),
        }
    }

    /// Move to `Closed` from any phase. Returns the phase it was in.
    pub fn close(&mut self) -> ConnectionState {
        std::mem::replace(&mut self.state, ConnectionState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn connection() -> Connection<Duration> {
        Connection::new(ConnectionId::new(1), at(0))
    }

    #[test]
    fn first_line_registers_later_lines_are_commands() {
        let mut conn = connection();

        let inbound = conn.receive(b"alice\n/join lobby\nhello\n", at(1)).unwrap();
        assert_eq!(inbound, vec![
            Inbound::Register("alice".into()),
            Inbound::Command(Command::Join("lobby".into())),
            Inbound::Command(Command::ChatText("hello".into())),
        ]);
    }

    #[test]
    fn blank_username_is_still_a_registration() {
        let mut conn = connection();

        let inbound = conn.receive(b"\n\n/users\n", at(1)).unwrap();
        assert_eq!(inbound, vec![Inbound::Register(String::new()), Inbound::Command(Command::ListUsers)]);
    }

    #[test]
    fn lifecycle() {
        let mut conn = connection();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.register().unwrap();
        assert_eq!(conn.state(), ConnectionState::Lobby);

        conn.enter_room().unwrap();
        conn.enter_room().unwrap();
        assert_eq!(conn.state(), ConnectionState::InRoom);

        assert_eq!(conn.close(), ConnectionState::InRoom);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn cannot_enter_room_before_registering() {
        let mut conn = connection();

        let result = conn.enter_room();
        assert!(matches!(result, Err(ConnectionError::InvalidState { state: ConnectionState::Connecting, .. })));
    }

    #[test]
    fn cannot_register_twice() {
        let mut conn = connection();
        conn.register().unwrap();

        assert!(matches!(conn.register(), Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn closed_connection_rejects_bytes() {
        let mut conn = connection();
        conn.close();

        let result = conn.receive(b"late\n", at(5));
        assert_eq!(result, Err(ConnectionError::InvalidState {
            state: ConnectionState::Closed,
            operation: "receive",
        }));
    }

    #[test]
    fn invalid_utf8_is_a_protocol_error() {
        let mut conn = connection();
        assert!(matches!(conn.receive(b"\xc3\x28\n", at(1)), Err(ConnectionError::Protocol(_))));
    }

    #[test]
    fn tracks_activity() {
        let mut conn = connection();
        conn.receive(b"ali", at(4)).unwrap();

        assert_eq!(conn.pending_bytes(), 3);
        assert_eq!(conn.age(at(10)), at(10));
        assert_eq!(conn.idle_for(at(10)), at(6));
    }

    proptest! {
        #[test]
        fn prop_registration_survives_any_chunking(split in 0usize..=24) {
            let stream = b"bob\n/join lobby\n/leader\n";
            let split = split.min(stream.len());

            let mut conn = connection();
            let mut inbound = conn.receive(&stream[..split], at(1)).unwrap();
            inbound.extend(conn.receive(&stream[split..], at(2)).unwrap());

            prop_assert_eq!(inbound, vec![
                Inbound::Register("bob".into()),
                Inbound::Command(Command::Join("lobby".into())),
                Inbound::Command(Command::WhoIsLeader),
            ]);
        }
    }
}
