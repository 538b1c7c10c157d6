//! Property-based tests for RoomDirectory
//!
//! Random join and leave sequences over a fixed set of sessions. After every
//! step the membership and leadership invariants must hold, and the leader of
//! each room must be the member an independent computation picks.

use std::collections::BTreeSet;

use hearth_core::ConnectionId;
use hearth_proto::{ServerLine, WallClock};
use hearth_server::{ConnectionRegistry, RoomDirectory, RoomError};
use proptest::prelude::*;

const USERS: u64 = 6;
const ROOMS: [&str; 4] = ["lobby", "dev", "ops", " "];

#[derive(Debug, Clone)]
enum Op {
    Join { user: u64, room: usize },
    Leave { user: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..USERS, 0..ROOMS.len()).prop_map(|(user, room)| Op::Join { user, room }),
        1 => (0..USERS).prop_map(|user| Op::Leave { user }),
    ]
}

/// Sessions registered in id order, with pairs sharing an instant so the
/// tie-breaker is exercised.
fn registry() -> ConnectionRegistry<u64> {
    let mut registry = ConnectionRegistry::new();
    for user in 0..USERS {
        registry.register(ConnectionId::new(user), &format!("user{user}"), user / 2).unwrap();
    }
    registry
}

fn check(registry: &ConnectionRegistry<u64>, directory: &RoomDirectory) -> Result<(), TestCaseError> {
    let mut seen = BTreeSet::new();

    for (room, members) in directory.rooms() {
        prop_assert!(!members.is_empty(), "room {} exists but is empty", room);

        for &member in members {
            prop_assert!(seen.insert(member), "{} is in more than one room", member);
            let session = registry.lookup(member).unwrap();
            prop_assert_eq!(session.room.as_ref(), Some(room));
        }

        let expected = members
            .iter()
            .min_by_key(|&&member| {
                let session = registry.lookup(member).unwrap();
                (session.joined_at, session.session_id)
            })
            .copied();
        let leader = directory.current_leader(room.as_str()).map(|leader| leader.connection);
        prop_assert_eq!(leader, expected, "wrong leader for {}", room);
    }

    for (connection, session) in registry.all() {
        if let Some(room) = &session.room {
            prop_assert!(directory.members_of(room.as_str()).is_some_and(|m| m.contains(&connection)));
        }
    }

    prop_assert_eq!(directory.leader_count(), directory.room_count());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: membership and leadership stay consistent under any sequence
    #[test]
    fn prop_directory_invariants_hold(ops in prop::collection::vec(op(), 1..80)) {
        let mut registry = registry();
        let mut directory = RoomDirectory::new();

        for op in ops {
            match op {
                Op::Join { user, room } => {
                    let connection = ConnectionId::new(user);
                    let before = registry.lookup(connection).unwrap().room.clone();
                    match directory.join(&mut registry, connection, ROOMS[room]) {
                        Ok(joined) => {
                            prop_assert_eq!(joined.confirmed_room.as_str(), ROOMS[room].trim());
                            prop_assert_eq!(joined.left.map(|left| left.room), before);
                        },
                        Err(RoomError::EmptyRoomName) => prop_assert!(ROOMS[room].trim().is_empty()),
                        Err(RoomError::AlreadyInRoom(current)) => {
                            prop_assert_eq!(Some(current), before);
                        },
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }
                },
                Op::Leave { user } => {
                    let connection = ConnectionId::new(user);
                    let was_in = registry.lookup(connection).unwrap().room.clone();
                    let left = directory.leave(&mut registry, connection);
                    prop_assert_eq!(left.map(|left| left.room), was_in);
                },
            }

            check(&registry, &directory)?;
        }
    }

    /// Property: a room disappears exactly when its last member leaves
    #[test]
    fn prop_room_deleted_with_last_member(joiners in 1u64..=USERS) {
        let mut registry = registry();
        let mut directory = RoomDirectory::new();

        for user in 0..joiners {
            directory.join(&mut registry, ConnectionId::new(user), "lobby").unwrap();
        }

        for user in 0..joiners {
            prop_assert!(directory.has_room("lobby"));
            let left = directory.leave(&mut registry, ConnectionId::new(user)).unwrap();
            prop_assert_eq!(left.room_deleted, user + 1 == joiners);
        }
        prop_assert!(!directory.has_room("lobby"));
        prop_assert!(directory.current_leader("lobby").is_none());
    }

    #[test]
    fn prop_accepted_usernames_survive_chat_lines(
        username in "[ \t]{0,2}[a-z]{1,6}( [a-z]{1,6})?[ \t]{0,2}",
    ) {
        let mut registry = ConnectionRegistry::new();
        if registry.register(ConnectionId::new(1), &username, 0u64).is_err() {
            prop_assert!(username.trim().contains(' '));
            return Ok(());
        }

        let sender = registry.lookup(ConnectionId::new(1)).unwrap().username.clone();
        let line = ServerLine::chat(7, WallClock::from_unix_secs(0), sender, "hi there".to_string());
        let wire = line.encode();
        let wire = std::str::from_utf8(&wire).unwrap();
        prop_assert_eq!(ServerLine::parse(wire.trim_end_matches('\n')), line);
    }
}
