//! Room directory: room name → member connections.
//!
//! Rooms are created by their first join and deleted by their last leave, so
//! an empty room never exists. A connection is in at most one room, and the
//! room recorded on its session always matches the member set it appears in.
//! Every membership change re-elects the room's leader before returning.

use std::{
    borrow::Borrow,
    collections::{BTreeSet, HashMap},
    fmt,
};

use hearth_core::ConnectionId;
use thiserror::Error;

use crate::{
    leader::{Leader, LeaderChange, LeaderElection},
    registry::ConnectionRegistry,
};

/// Name of a room: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(String);

impl RoomName {
    /// Trim `raw` and reject it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(RoomError::EmptyRoomName);
        }
        Ok(Self(name.to_owned()))
    }

    /// The name as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RoomName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors from room operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Room name was empty after trimming
    #[error("room name is empty")]
    EmptyRoomName,

    /// Connection has no session
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    /// Connection is already a member of this room
    #[error("already in room {0}")]
    AlreadyInRoom(RoomName),
}

/// A completed join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    /// Room the connection is now in
    pub confirmed_room: RoomName,
    /// Whether this join created the room
    pub created: bool,
    /// The previous room, left implicitly
    pub left: Option<LeaveResult>,
    /// Leadership change in the joined room
    pub leader_change: LeaderChange,
}

/// A completed leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveResult {
    /// Room that was left
    pub room: RoomName,
    /// Whether the leaving connection led the room
    pub was_leader: bool,
    /// Whether the room was deleted because it became empty
    pub room_deleted: bool,
    /// Leadership change in the room that was left
    pub leader_change: LeaderChange,
}

/// All rooms and their members.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomName, BTreeSet<ConnectionId>>,
    leaders: LeaderElection,
}

impl RoomDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `connection` into the room named by `raw_name`.
    ///
    /// Leaves the connection's current room first. Creates the target room if
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// - `RoomError::EmptyRoomName` if the trimmed name is empty
    /// - `RoomError::NotRegistered` if the connection has no session
    /// - `RoomError::AlreadyInRoom` if it is already in that room; nothing
    ///   changes
    pub fn join<I: Copy + Ord>(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        connection: ConnectionId,
        raw_name: &str,
    ) -> Result<JoinResult, RoomError> {
        let name = RoomName::parse(raw_name)?;
        let session = registry.lookup(connection).ok_or(RoomError::NotRegistered(connection))?;
        if session.room.as_ref() == Some(&name) {
            return Err(RoomError::AlreadyInRoom(name));
        }

        let left = self.leave(registry, connection);

        let members = self.rooms.entry(name.clone()).or_default();
        let created = members.is_empty();
        members.insert(connection);
        if let Some(session) = registry.lookup_mut(connection) {
            session.room = Some(name.clone());
        }

        let leader_change = self.leaders.recompute(&name, members, registry);

        Ok(JoinResult { confirmed_room: name, created, left, leader_change })
    }

    /// Take `connection` out of its room, if it is in one.
    ///
    /// Deletes the room when it becomes empty. Returns `None` for
    /// connections that are not registered or not in a room.
    pub fn leave<I: Copy + Ord>(
        &mut self,
        registry: &mut ConnectionRegistry<I>,
        connection: ConnectionId,
    ) -> Option<LeaveResult> {
        let room = registry.lookup_mut(connection)?.room.take()?;
        let was_leader = self
            .leaders
            .current_leader(room.as_str())
            .is_some_and(|leader| leader.connection == connection);

        if let Some(members) = self.rooms.get_mut(room.as_str()) {
            members.remove(&connection);
        }
        let room_deleted = self.rooms.get(room.as_str()).is_none_or(BTreeSet::is_empty);
        if room_deleted {
            self.rooms.remove(room.as_str());
        }

        let empty = BTreeSet::new();
        let members = self.rooms.get(room.as_str()).unwrap_or(&empty);
        let leader_change = self.leaders.recompute(&room, members, registry);

        Some(LeaveResult { room, was_leader, room_deleted, leader_change })
    }

    /// Members of `room`, or `None` if it does not exist.
    pub fn members_of(&self, room: &str) -> Option<&BTreeSet<ConnectionId>> {
        self.rooms.get(room)
    }

    /// Room `connection` is in, read from its session.
    pub fn room_of<'r, I>(
        &self,
        registry: &'r ConnectionRegistry<I>,
        connection: ConnectionId,
    ) -> Option<&'r RoomName>
    where
        I: Copy,
    {
        registry.lookup(connection)?.room.as_ref()
    }

    /// Cached leader of `room`.
    pub fn current_leader(&self, room: &str) -> Option<&Leader> {
        self.leaders.current_leader(room)
    }

    /// Whether `room` exists.
    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of rooms with a cached leader. Equal to [`Self::room_count`]
    /// whenever no operation is in progress.
    pub fn leader_count(&self) -> usize {
        self.leaders.len()
    }

    /// Every room with its members, in no particular order.
    pub fn rooms(&self) -> impl Iterator<Item = (&RoomName, &BTreeSet<ConnectionId>)> + '_ {
        self.rooms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn setup(users: &[&str]) -> (ConnectionRegistry<u64>, RoomDirectory) {
        let mut registry = ConnectionRegistry::new();
        for (i, name) in users.iter().enumerate() {
            registry.register(conn(i as u64 + 1), name, i as u64).unwrap();
        }
        (registry, RoomDirectory::new())
    }

    #[test]
    fn first_join_creates_room() {
        let (mut registry, mut directory) = setup(&["alice"]);
        assert!(!directory.has_room("lobby"));

        let joined = directory.join(&mut registry, conn(1), "  lobby ").unwrap();

        assert_eq!(joined.confirmed_room.as_str(), "lobby");
        assert!(joined.created);
        assert_eq!(joined.left, None);
        assert!(matches!(joined.leader_change, LeaderChange::Elected(ref l) if l.connection == conn(1)));
        assert!(directory.has_room("lobby"));
        assert_eq!(directory.room_of(&registry, conn(1)).map(RoomName::as_str), Some("lobby"));
    }

    #[test]
    fn second_join_does_not_create() {
        let (mut registry, mut directory) = setup(&["alice", "bob"]);
        directory.join(&mut registry, conn(1), "lobby").unwrap();

        let joined = directory.join(&mut registry, conn(2), "lobby").unwrap();

        assert!(!joined.created);
        assert_eq!(joined.leader_change, LeaderChange::Unchanged);
        assert_eq!(directory.members_of("lobby").unwrap().len(), 2);
    }

    #[test]
    fn switching_rooms_leaves_the_old_one() {
        let (mut registry, mut directory) = setup(&["alice", "bob"]);
        directory.join(&mut registry, conn(1), "lobby").unwrap();
        directory.join(&mut registry, conn(2), "lobby").unwrap();

        let joined = directory.join(&mut registry, conn(1), "dev").unwrap();

        let left = joined.left.unwrap();
        assert_eq!(left.room.as_str(), "lobby");
        assert!(left.was_leader);
        assert!(!left.room_deleted);
        assert!(matches!(left.leader_change, LeaderChange::Elected(ref l) if l.username == "bob"));

        assert!(!directory.members_of("lobby").unwrap().contains(&conn(1)));
        assert!(directory.members_of("dev").unwrap().contains(&conn(1)));
    }

    #[test]
    fn last_leave_deletes_room() {
        let (mut registry, mut directory) = setup(&["alice"]);
        directory.join(&mut registry, conn(1), "lobby").unwrap();

        let left = directory.leave(&mut registry, conn(1)).unwrap();

        assert!(left.room_deleted);
        assert!(left.was_leader);
        assert_eq!(left.leader_change, LeaderChange::Vacated);
        assert!(!directory.has_room("lobby"));
        assert!(directory.current_leader("lobby").is_none());
        assert_eq!(directory.leader_count(), 0);
        assert_eq!(registry.lookup(conn(1)).unwrap().room, None);
    }

    #[test]
    fn leave_without_room_is_a_no_op() {
        let (mut registry, mut directory) = setup(&["alice"]);

        assert_eq!(directory.leave(&mut registry, conn(1)), None);
        assert_eq!(directory.leave(&mut registry, conn(42)), None);
    }

    #[test]
    fn rejoining_current_room_changes_nothing() {
        let (mut registry, mut directory) = setup(&["alice"]);
        directory.join(&mut registry, conn(1), "lobby").unwrap();

        let result = directory.join(&mut registry, conn(1), "lobby ");

        assert_eq!(result, Err(RoomError::AlreadyInRoom(RoomName::parse("lobby").unwrap())));
        assert_eq!(directory.members_of("lobby").unwrap().len(), 1);
    }

    #[test]
    fn empty_room_name_rejected() {
        let (mut registry, mut directory) = setup(&["alice"]);

        assert_eq!(directory.join(&mut registry, conn(1), "   "), Err(RoomError::EmptyRoomName));
        assert_eq!(directory.room_count(), 0);
    }

    #[test]
    fn unregistered_connection_cannot_join() {
        let (mut registry, mut directory) = setup(&[]);

        assert_eq!(directory.join(&mut registry, conn(7), "lobby"), Err(RoomError::NotRegistered(conn(7))));
    }

    #[test]
    fn leader_follows_registration_order() {
        let (mut registry, mut directory) = setup(&["a", "b", "c"]);
        for id in [3, 1, 2] {
            directory.join(&mut registry, conn(id), "lobby").unwrap();
        }
        assert_eq!(directory.current_leader("lobby").unwrap().username, "a");

        directory.leave(&mut registry, conn(1));
        assert_eq!(directory.current_leader("lobby").unwrap().username, "b");

        directory.leave(&mut registry, conn(2));
        assert_eq!(directory.current_leader("lobby").unwrap().username, "c");
    }
}
