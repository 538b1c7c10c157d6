//! Relay state snapshots for invariant checking.
//!
//! Invariants run on a copy of the state rather than the live driver, so
//! every check sees the same moment.

use std::collections::BTreeSet;

use hearth_core::{ConnectionState, Environment};
use hearth_server::ServerDriver;

/// Copy of the relay state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Registered sessions, by connection id.
    pub sessions: Vec<SessionSnapshot>,
    /// Live rooms, by name.
    pub rooms: Vec<RoomSnapshot>,
    /// Entries in the leader cache.
    pub leader_entries: usize,
    /// Open connections, registered or not.
    pub connection_count: usize,
}

/// One registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection the session lives on.
    pub connection: u64,
    /// Registration order tie-breaker.
    pub session_id: u64,
    /// Trimmed username.
    pub username: String,
    /// Room the session is in.
    pub room: Option<String>,
    /// Position in registration order, 0 for the earliest session.
    pub rank: usize,
    /// Lifecycle state of the connection.
    pub state: Option<ConnectionState>,
}

/// One room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room name.
    pub name: String,
    /// Member connections.
    pub members: BTreeSet<u64>,
    /// Connection of the cached leader.
    pub leader: Option<u64>,
}

impl SystemSnapshot {
    /// Nothing connected.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy the state out of `driver`.
    pub fn from_driver<E: Environment>(driver: &ServerDriver<E>) -> Self {
        let registry = driver.registry();
        let directory = driver.directory();

        let mut order: Vec<_> = registry
            .all()
            .map(|(connection, session)| (session.joined_at, session.session_id, connection))
            .collect();
        order.sort();

        let sessions = registry
            .all()
            .map(|(connection, session)| SessionSnapshot {
                connection: connection.get(),
                session_id: session.session_id.get(),
                username: session.username.clone(),
                room: session.room.as_ref().map(ToString::to_string),
                rank: order.iter().position(|(_, _, c)| *c == connection).unwrap_or(usize::MAX),
                state: driver.connection_state(connection),
            })
            .collect();

        let mut rooms: Vec<_> = directory
            .rooms()
            .map(|(name, members)| RoomSnapshot {
                name: name.to_string(),
                members: members.iter().map(|c| c.get()).collect(),
                leader: directory.current_leader(name.as_str()).map(|leader| leader.connection.get()),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            sessions,
            rooms,
            leader_entries: directory.leader_count(),
            connection_count: driver.connection_count(),
        }
    }

    /// Session living on `connection`.
    pub fn session(&self, connection: u64) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|session| session.connection == connection)
    }

    /// Room called `name`.
    pub fn room(&self, name: &str) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|room| room.name == name)
    }
}
