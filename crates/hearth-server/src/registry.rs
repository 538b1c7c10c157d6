//! Connection registry: which connections are registered, under which name.
//!
//! A connection only appears here once its username line has been accepted,
//! so rooms and broadcasts never see a half-registered connection. Usernames
//! are not unique; two sessions may share one.

use std::collections::BTreeMap;

use hearth_core::{ConnectionId, SessionId};
use thiserror::Error;

use crate::room_directory::RoomName;

/// A registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session<I> {
    /// Registration sequence number
    pub session_id: SessionId,
    /// Name from the first line, trimmed
    pub username: String,
    /// Room the connection is in, if any
    pub room: Option<RoomName>,
    /// When registration completed (monotonic)
    pub joined_at: I,
}

/// Errors from registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Username was empty after trimming
    #[error("username is empty")]
    EmptyUsername,

    /// Username contains whitespace after trimming
    #[error("username '{0}' contains whitespace")]
    WhitespaceInUsername(String),

    /// Connection is already registered
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}

/// Registry of sessions, keyed by connection.
#[derive(Debug)]
pub struct ConnectionRegistry<I> {
    sessions: BTreeMap<ConnectionId, Session<I>>,
    next_session_id: u64,
}

impl<I> Default for ConnectionRegistry<I> {
    fn default() -> Self {
        Self { sessions: BTreeMap::new(), next_session_id: 1 }
    }
}

impl<I: Copy> ConnectionRegistry<I> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `username`, stamped with `now`.
    ///
    /// The username is trimmed and must be a single word: chat lines carry
    /// it as one space-separated field. The new session starts outside any
    /// room.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        username: &str,
        now: I,
    ) -> Result<SessionId, RegistryError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(RegistryError::EmptyUsername);
        }
        if username.contains(char::is_whitespace) {
            return Err(RegistryError::WhitespaceInUsername(username.to_owned()));
        }
        if self.sessions.contains_key(&connection) {
            return Err(RegistryError::AlreadyRegistered(connection));
        }

        let session_id = SessionId::new(self.next_session_id);
        self.next_session_id += 1;

        self.sessions.insert(connection, Session {
            session_id,
            username: username.to_owned(),
            room: None,
            joined_at: now,
        });

        Ok(session_id)
    }

    /// Session of `connection`, if registered.
    pub fn lookup(&self, connection: ConnectionId) -> Option<&Session<I>> {
        self.sessions.get(&connection)
    }

    /// Room bookkeeping goes through the room directory only.
    pub(crate) fn lookup_mut(&mut self, connection: ConnectionId) -> Option<&mut Session<I>> {
        self.sessions.get_mut(&connection)
    }

    /// Every session, ordered by connection id.
    pub fn all(&self) -> impl Iterator<Item = (ConnectionId, &Session<I>)> + '_ {
        self.sessions.iter().map(|(&connection, session)| (connection, session))
    }

    /// Every username, in registration order.
    pub fn usernames(&self) -> Vec<&str> {
        let mut sessions: Vec<&Session<I>> = self.sessions.values().collect();
        sessions.sort_by_key(|session| session.session_id);
        sessions.into_iter().map(|session| session.username.as_str()).collect()
    }

    /// Remove a session. Callers must take it out of its room first.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Session<I>> {
        self.sessions.remove(&connection)
    }

    /// Whether `connection` has a session.
    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.sessions.contains_key(&connection)
    }

    /// Number of sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ConnectionRegistry::new();

        let session_id = registry.register(conn(1), "  alice \r", 10u64).unwrap();
        let session = registry.lookup(conn(1)).unwrap();

        assert_eq!(session.session_id, session_id);
        assert_eq!(session.username, "alice");
        assert_eq!(session.room, None);
        assert_eq!(session.joined_at, 10);
        assert!(registry.is_registered(conn(1)));
    }

    #[test]
    fn empty_username_rejected() {
        let mut registry = ConnectionRegistry::new();

        assert_eq!(registry.register(conn(1), "", 0u64), Err(RegistryError::EmptyUsername));
        assert_eq!(registry.register(conn(1), " \t\r", 0u64), Err(RegistryError::EmptyUsername));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn username_must_be_one_word() {
        let mut registry = ConnectionRegistry::new();

        let result = registry.register(conn(1), " alice smith ", 0u64);
        assert_eq!(result, Err(RegistryError::WhitespaceInUsername("alice smith".into())));
        assert_eq!(
            registry.register(conn(1), "alice\tsmith", 0u64),
            Err(RegistryError::WhitespaceInUsername("alice\tsmith".into()))
        );
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ConnectionRegistry::new();
        registry.register(conn(1), "alice", 0u64).unwrap();

        let result = registry.register(conn(1), "mallory", 1);
        assert_eq!(result, Err(RegistryError::AlreadyRegistered(conn(1))));
        assert_eq!(registry.lookup(conn(1)).unwrap().username, "alice");
    }

    #[test]
    fn session_ids_increase() {
        let mut registry = ConnectionRegistry::new();

        let first = registry.register(conn(9), "a", 0u64).unwrap();
        let second = registry.register(conn(3), "b", 0).unwrap();
        assert!(second > first);
    }

    #[test]
    fn usernames_in_registration_order() {
        let mut registry = ConnectionRegistry::new();
        registry.register(conn(5), "carol", 0u64).unwrap();
        registry.register(conn(2), "alice", 1).unwrap();
        registry.register(conn(7), "alice", 2).unwrap();

        assert_eq!(registry.usernames(), vec!["carol", "alice", "alice"]);
    }

    #[test]
    fn remove_forgets_session() {
        let mut registry = ConnectionRegistry::new();
        registry.register(conn(1), "alice", 0u64).unwrap();

        assert!(registry.remove(conn(1)).is_some());
        assert!(registry.remove(conn(1)).is_none());
        assert!(!registry.is_registered(conn(1)));
    }
}
