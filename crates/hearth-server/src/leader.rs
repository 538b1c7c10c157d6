//! Leader election.
//!
//! A room's leader is its member with the earliest registration instant,
//! ties broken by session id. That is a total order, so any member set has
//! exactly one leader and recomputing it is deterministic. The election keeps
//! a cache per room; [`LeaderElection::recompute`] is the only writer.

use std::collections::{BTreeSet, HashMap};

use hearth_core::ConnectionId;

use crate::{registry::ConnectionRegistry, room_directory::RoomName};

/// The leader of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Leader's connection
    pub connection: ConnectionId,
    /// Leader's username at election time
    pub username: String,
}

/// Outcome of a recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderChange {
    /// Same leader as before (or still none)
    Unchanged,
    /// A different member now leads
    Elected(Leader),
    /// Room has no members left; its entry was dropped
    Vacated,
}

/// Cached leader per room.
#[derive(Debug, Default)]
pub struct LeaderElection {
    leaders: HashMap<RoomName, Leader>,
}

impl LeaderElection {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-elect the leader of `room` from its current `members`.
    ///
    /// Members without a session are skipped. Called after every membership
    /// change of the room.
    pub fn recompute<I: Copy + Ord>(
        &mut self,
        room: &RoomName,
        members: &BTreeSet<ConnectionId>,
        registry: &ConnectionRegistry<I>,
    ) -> LeaderChange {
        let earliest = members
            .iter()
            .filter_map(|&connection| registry.lookup(connection).map(|session| (connection, session)))
            .min_by_key(|(_, session)| (session.joined_at, session.session_id));

        match earliest {
            Some((connection, session)) => {
                let leader = Leader { connection, username: session.username.clone() };
                if self.leaders.get(room) == Some(&leader) {
                    return LeaderChange::Unchanged;
                }
                self.leaders.insert(room.clone(), leader.clone());
                LeaderChange::Elected(leader)
            },
            None => {
                if self.leaders.remove(room).is_some() {
                    LeaderChange::Vacated
                } else {
                    LeaderChange::Unchanged
                }
            },
        }
    }

    /// Cached leader of `room`.
    pub fn current_leader(&self, room: &str) -> Option<&Leader> {
        self.leaders.get(room)
    }

    /// Number of rooms with a cached leader.
    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    /// Whether no room has a cached leader.
    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }
}
