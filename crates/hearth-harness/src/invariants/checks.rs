//! Standard invariant checks.

use std::collections::HashMap;

use hearth_core::ConnectionState;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A connection is a member of at most one room.
pub struct SingleRoomMembership;

impl Invariant for SingleRoomMembership {
    fn name(&self) -> &'static str {
        "single_room_membership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen: HashMap<u64, &str> = HashMap::new();
        for room in &state.rooms {
            for &member in &room.members {
                if let Some(other) = seen.insert(member, &room.name) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("connection {member} is in both {other} and {}", room.name),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A session names a room exactly when that room lists it as a member, and
/// every member is registered.
pub struct MembershipConsistency;

impl Invariant for MembershipConsistency {
    fn name(&self) -> &'static str {
        "membership_consistency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for session in &state.sessions {
            let Some(name) = &session.room else { continue };
            let listed = state.room(name).is_some_and(|room| room.members.contains(&session.connection));
            if !listed {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} (connection {}) thinks it is in {name} but the room does not list it",
                        session.username, session.connection
                    ),
                });
            }
        }

        for room in &state.rooms {
            for &member in &room.members {
                let session_room = state.session(member).map(|session| session.room.as_deref());
                if session_room != Some(Some(room.name.as_str())) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room {} lists connection {member} whose session says {session_room:?}",
                            room.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every room has a member, and the leader cache has one entry per room.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn name(&self) -> &'static str {
        "no_empty_rooms"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if let Some(room) = state.rooms.iter().find(|room| room.members.is_empty()) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("room {} has no members", room.name),
            });
        }
        if state.leader_entries != state.rooms.len() {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} leader entries for {} rooms",
                    state.leader_entries,
                    state.rooms.len()
                ),
            });
        }
        Ok(())
    }
}

/// The leader of a room is its member with the earliest registration.
pub struct LeaderValidity;

impl Invariant for LeaderValidity {
    fn name(&self) -> &'static str {
        "leader_validity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            let expected = room
                .members
                .iter()
                .filter_map(|&member| state.session(member))
                .min_by_key(|session| session.rank)
                .map(|session| session.connection);

            if room.leader != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "room {}: leader is {:?}, earliest member is {expected:?}",
                        room.name, room.leader
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A registered connection is in the lobby when roomless and in a room
/// otherwise. No more sessions than connections.
pub struct StateConsistency;

impl Invariant for StateConsistency {
    fn name(&self) -> &'static str {
        "state_consistency"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.sessions.len() > state.connection_count {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} sessions on {} connections",
                    state.sessions.len(),
                    state.connection_count
                ),
            });
        }

        for session in &state.sessions {
            let expected = match session.room {
                Some(_) => ConnectionState::InRoom,
                None => ConnectionState::Lobby,
            };
            if session.state != Some(expected) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} (connection {}) is {:?}, expected {expected:?}",
                        session.username, session.connection, session.state
                    ),
                });
            }
        }
        Ok(())
    }
}
