//! Fuzz target for the relay state machine
//!
//! Drives a simulated relay with arbitrary client behavior: raw bytes split
//! anywhere, hang-ups, broken sockets and time jumps.
//!
//! # Strategy
//!
//! - A handful of connections, reused by index
//! - Well-formed commands mixed with arbitrary bytes
//! - Peers whose writes fail mid-broadcast
//!
//! # Invariants
//!
//! - NEVER panic
//! - Every relay invariant holds after every event
//! - Once everyone hangs up, no session, room or leader is left

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use hearth_core::ConnectionId;
use hearth_harness::{InvariantRegistry, SimServer, SystemSnapshot};
use libfuzzer_sys::fuzz_target;

const MAX_CONNECTIONS: usize = 6;

#[derive(Debug, Arbitrary)]
enum Event {
    Connect,
    Line { conn: u8, line: ClientLine },
    Bytes { conn: u8, bytes: Vec<u8> },
    HangUp { conn: u8 },
    BreakWrites { conn: u8 },
    Advance { secs: u16 },
}

#[derive(Debug, Arbitrary)]
enum ClientLine {
    Username(String),
    Join(u8),
    Users,
    Room,
    Leader,
    Quit,
    Chat(String),
}

const ROOMS: [&str; 4] = ["lobby", "dev", " ops ", ""];

impl ClientLine {
    fn render(&self) -> String {
        match self {
            Self::Username(name) | Self::Chat(name) => name.replace('\n', " "),
            Self::Join(room) => format!("/join {}", ROOMS[usize::from(*room) % ROOMS.len()]),
            Self::Users => "/users".to_string(),
            Self::Room => "/room".to_string(),
            Self::Leader => "/leader".to_string(),
            Self::Quit => "QUIT".to_string(),
        }
    }
}

fn pick(connections: &[ConnectionId], index: u8) -> Option<ConnectionId> {
    if connections.is_empty() {
        return None;
    }
    connections.get(usize::from(index) % connections.len()).copied()
}

fuzz_target!(|events: Vec<Event>| {
    let mut server = SimServer::new();
    let invariants = InvariantRegistry::standard();
    let mut connections = Vec::new();

    for (step, event) in events.iter().enumerate() {
        match event {
            Event::Connect => {
                if connections.len() < MAX_CONNECTIONS {
                    connections.push(server.connect());
                }
            },
            Event::Line { conn, line } => {
                if let Some(c) = pick(&connections, *conn) {
                    let _ = server.send(c, &line.render());
                }
            },
            Event::Bytes { conn, bytes } => {
                if let Some(c) = pick(&connections, *conn) {
                    let _ = server.send_bytes(c, bytes);
                }
            },
            Event::HangUp { conn } => {
                if let Some(c) = pick(&connections, *conn) {
                    let _ = server.hang_up(c);
                }
            },
            Event::BreakWrites { conn } => {
                if let Some(c) = pick(&connections, *conn) {
                    server.break_writes(c);
                }
            },
            Event::Advance { secs } => server.advance(Duration::from_secs(u64::from(*secs))),
        }

        connections.retain(|&c| !server.is_closed(c));
        let snapshot = SystemSnapshot::from_driver(server.driver());
        invariants.assert_all(&snapshot, &format!("after step {step}: {event:?}"));
    }

    for c in connections {
        let _ = server.hang_up(c);
    }
    let driver = server.driver();
    assert_eq!(driver.registry().session_count(), 0);
    assert_eq!(driver.directory().room_count(), 0);
    assert_eq!(driver.directory().leader_count(), 0);
});
