//! Server driver.
//!
//! Ties together the per-connection state machines, the connection registry,
//! the room directory and leader election. Pure: events in, actions out, no
//! I/O. The runtime (TCP or simulation) produces the events and executes the
//! actions, one event at a time.

use std::collections::HashMap;

use bytes::Bytes;
use hearth_core::{Connection, ConnectionId, ConnectionState, Environment, Inbound, LogicalClock};
use hearth_proto::{Command, ServerLine, WallClock};

use crate::{
    leader::LeaderChange,
    registry::{ConnectionRegistry, RegistryError},
    room_directory::{LeaveResult, RoomDirectory, RoomError, RoomName},
    server_error::DriverError,
};

/// Banner sent to every client after it registers.
pub const DEFAULT_WELCOME_BANNER: &str = "Welcome to the chat server!";

/// Fixed reply texts.
pub mod replies {
    /// Sent before closing a connection whose first line was blank.
    pub const USERNAME_REQUIRED: &str = "Username required";
    /// Sent before closing a connection whose username has a space in it.
    pub const USERNAME_ONE_WORD: &str = "Username must be a single word";
    /// `/join` without a room name.
    pub const JOIN_USAGE: &str = "Usage: /join <room>";
    /// Chat text from a connection outside any room.
    pub const JOIN_FIRST: &str = "Join a room first using /join <room>";
    /// `/leader` from a connection outside any room.
    pub const NO_LEADER: &str = "No leader (join a room first)";
    /// Unrecognized slash command.
    pub const UNKNOWN_COMMAND: &str = "Unknown command";
    /// `/room` from a connection outside any room.
    pub const NOT_IN_ROOM: &str = "You are not in any room";
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections, registered or not
    pub max_connections: usize,
    /// Plain-text line sent after a successful registration
    pub welcome_banner: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000, welcome_banner: DEFAULT_WELCOME_BANNER.to_string() }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        connection: ConnectionId,
    },

    /// Bytes arrived on a connection, in whatever chunk the transport read
    BytesReceived {
        /// Connection that sent the bytes
        connection: ConnectionId,
        /// Raw bytes, possibly partial lines
        bytes: Bytes,
    },

    /// The peer closed the connection or reading from it failed
    ConnectionClosed {
        /// Connection that was closed
        connection: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// A write to the connection failed during delivery
    DeliveryFailed {
        /// Connection whose write failed
        connection: ConnectionId,
        /// Transport error
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// Executed in order by runtime-specific code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send a line to one connection
    SendToConnection {
        /// Target connection
        connection: ConnectionId,
        /// Line to send
        line: ServerLine,
    },

    /// Send a line to every member of a room
    BroadcastToRoom {
        /// Target room
        room: RoomName,
        /// Line to broadcast
        line: ServerLine,
        /// Optional member to skip (usually the sender)
        exclude: Option<ConnectionId>,
    },

    /// Send a line to every registered connection
    BroadcastToAll {
        /// Line to broadcast
        line: ServerLine,
        /// Optional connection to skip
        exclude: Option<ConnectionId>,
    },

    /// Close a connection's transport
    CloseConnection {
        /// Connection to close
        connection: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Whether a connection survived handling an inbound item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Closed,
}

/// Action-based server driver.
///
/// Owns all relay state. Only [`Self::process_event`] mutates it.
pub struct ServerDriver<E: Environment> {
    /// Connection state machines, including unregistered ones
    connections: HashMap<ConnectionId, Connection<E::Instant>>,
    /// Registered sessions
    registry: ConnectionRegistry<E::Instant>,
    /// Rooms, members and leaders
    directory: RoomDirectory,
    /// Stamps structured lines
    clock: LogicalClock,
    /// Environment (time)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E: Environment> ServerDriver<E> {
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self {
            connections: HashMap::new(),
            registry: ConnectionRegistry::new(),
            directory: RoomDirectory::new(),
            clock: LogicalClock::new(),
            env,
            config,
        }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { connection } => {
                self.handle_connection_accepted(connection)
            },
            ServerEvent::BytesReceived { connection, bytes } => {
                self.handle_bytes_received(connection, &bytes)
            },
            ServerEvent::ConnectionClosed { connection, reason } => {
                Ok(self.close_connection(connection, &reason))
            },
            ServerEvent::DeliveryFailed { connection, reason } => {
                Ok(self.handle_delivery_failed(connection, &reason))
            },
        }
    }

    fn handle_connection_accepted(
        &mut self,
        connection: ConnectionId,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if self.connections.contains_key(&connection) {
            return Err(DriverError::ConnectionExists(connection));
        }

        if self.connections.len() >= self.config.max_connections {
            return Ok(vec![
                log(LogLevel::Warn, format!("rejecting connection {connection}: max connections exceeded")),
                ServerAction::CloseConnection {
                    connection,
                    reason: "max connections exceeded".to_string(),
                },
            ]);
        }

        self.connections.insert(connection, Connection::new(connection, self.env.now()));

        Ok(vec![log(LogLevel::Debug, format!("connection {connection} accepted"))])
    }

    fn handle_bytes_received(
        &mut self,
        connection: ConnectionId,
        bytes: &[u8],
    ) -> Result<Vec<ServerAction>, DriverError> {
        let now = self.env.now();
        let conn =
            self.connections.get_mut(&connection).ok_or(DriverError::ConnectionNotFound(connection))?;

        let inbound = match conn.receive(bytes, now) {
            Ok(inbound) => inbound,
            Err(e) => {
                let mut actions =
                    vec![log(LogLevel::Warn, format!("dropping connection {connection}: {e}"))];
                actions.extend(self.close_connection(connection, &e.to_string()));
                return Ok(actions);
            },
        };

        let mut actions = Vec::new();
        for item in inbound {
            let flow = match item {
                Inbound::Register(username) => {
                    self.handle_registration(connection, &username, &mut actions)
                },
                Inbound::Command(command) => self.handle_command(connection, command, &mut actions),
            };
            if flow == Flow::Closed {
                break;
            }
        }

        Ok(actions)
    }

    fn handle_registration(
        &mut self,
        connection: ConnectionId,
        username: &str,
        actions: &mut Vec<ServerAction>,
    ) -> Flow {
        let now = self.env.now();

        match self.registry.register(connection, username, now) {
            Ok(session_id) => {
                if let Some(Err(e)) = self.connections.get_mut(&connection).map(Connection::register) {
                    actions.push(log(LogLevel::Error, format!("connection {connection}: {e}")));
                }
                actions.push(reply(connection, ServerLine::raw(self.config.welcome_banner.clone())));
                actions.push(log(
                    LogLevel::Info,
                    format!("connection {connection} registered as {} (session {session_id})", username.trim()),
                ));
                Flow::Continue
            },
            Err(e) => {
                let text = match &e {
                    RegistryError::WhitespaceInUsername(_) => replies::USERNAME_ONE_WORD,
                    RegistryError::EmptyUsername | RegistryError::AlreadyRegistered(_) => {
                        replies::USERNAME_REQUIRED
                    },
                };
                actions.push(reply(connection, ServerLine::raw(text)));
                actions.push(log(LogLevel::Warn, format!("registration failed for connection {connection}: {e}")));
                actions.extend(self.close_connection(connection, "malformed handshake"));
                Flow::Closed
            },
        }
    }

    fn handle_command(
        &mut self,
        connection: ConnectionId,
        command: Command,
        actions: &mut Vec<ServerAction>,
    ) -> Flow {
        let Some(username) = self.registry.lookup(connection).map(|session| session.username.clone())
        else {
            actions.push(log(LogLevel::Warn, format!("command from unregistered connection {connection}")));
            return Flow::Continue;
        };

        actions.push(log(LogLevel::Debug, format!("{username} sent: {command}")));

        match command {
            Command::ListUsers => {
                let users = self.registry.usernames().join(", ");
                actions.push(reply(connection, ServerLine::raw(format!("Users: {users}"))));
            },
            Command::WhoAmI => {
                let text = match self.directory.room_of(&self.registry, connection) {
                    Some(room) => format!("You are in room {room}"),
                    None => replies::NOT_IN_ROOM.to_string(),
                };
                actions.push(reply(connection, ServerLine::system(self.clock.tick(), text)));
            },
            Command::Join(name) => self.handle_join(connection, &username, &name, actions),
            Command::WhoIsLeader => {
                let leader = self
                    .directory
                    .room_of(&self.registry, connection)
                    .and_then(|room| self.directory.current_leader(room.as_str()))
                    .map(|leader| leader.username.clone());
                let line = match leader {
                    Some(leader) => ServerLine::leader(self.clock.tick(), leader),
                    None => ServerLine::raw(replies::NO_LEADER),
                };
                actions.push(reply(connection, line));
            },
            Command::Quit => {
                actions.extend(self.close_connection(connection, "client quit"));
                return Flow::Closed;
            },
            Command::ChatText(text) => match self.directory.room_of(&self.registry, connection).cloned() {
                Some(room) => {
                    let wall_clock = WallClock::from_unix_secs(self.env.wall_clock_secs());
                    let line = ServerLine::chat(self.clock.tick(), wall_clock, username, text);
                    actions.push(ServerAction::BroadcastToRoom { room, line, exclude: Some(connection) });
                },
                None => actions.push(reply(connection, ServerLine::raw(replies::JOIN_FIRST))),
            },
            Command::Unknown(raw) => {
                actions.push(reply(connection, ServerLine::raw(replies::UNKNOWN_COMMAND)));
                actions.push(log(LogLevel::Debug, format!("unknown command from {username}: {raw}")));
            },
        }

        Flow::Continue
    }

    fn handle_join(
        &mut self,
        connection: ConnectionId,
        username: &str,
        name: &str,
        actions: &mut Vec<ServerAction>,
    ) {
        match self.directory.join(&mut self.registry, connection, name) {
            Ok(joined) => {
                if let Some(Err(e)) = self.connections.get_mut(&connection).map(Connection::enter_room) {
                    actions.push(log(LogLevel::Error, format!("connection {connection}: {e}")));
                }
                if let Some(left) = joined.left {
                    self.announce_departure(connection, username, left, actions);
                }

                let room = joined.confirmed_room;
                let text = format!("You joined room {room}");
                actions.push(reply(connection, ServerLine::system(self.clock.tick(), text)));
                if !joined.created {
                    actions.push(ServerAction::BroadcastToRoom {
                        room: room.clone(),
                        line: ServerLine::system(self.clock.tick(), format!("{username} joined the room")),
                        exclude: Some(connection),
                    });
                }
                self.announce_leader(&room, &joined.leader_change, actions);

                let verb = if joined.created { "created" } else { "joined" };
                actions.push(log(LogLevel::Info, format!("{username} {verb} room {room}")));
            },
            Err(RoomError::EmptyRoomName) => {
                actions.push(reply(connection, ServerLine::raw(replies::JOIN_USAGE)));
            },
            Err(RoomError::AlreadyInRoom(room)) => {
                let text = format!("You are already in room {room}");
                actions.push(reply(connection, ServerLine::system(self.clock.tick(), text)));
            },
            Err(e @ RoomError::NotRegistered(_)) => {
                actions.push(log(LogLevel::Warn, format!("join rejected: {e}")));
            },
        }
    }

    /// Global departure notice plus the new leader of the room that was left.
    fn announce_departure(
        &mut self,
        connection: ConnectionId,
        username: &str,
        left: LeaveResult,
        actions: &mut Vec<ServerAction>,
    ) {
        let text = format!("{username} left the room {}", left.room);
        actions.push(ServerAction::BroadcastToAll {
            line: ServerLine::system(self.clock.tick(), text),
            exclude: Some(connection),
        });

        if left.was_leader {
            actions.push(log(LogLevel::Debug, format!("leader {username} left room {}", left.room)));
        }
        self.announce_leader(&left.room, &left.leader_change, actions);
        if left.room_deleted {
            actions.push(log(LogLevel::Debug, format!("room {} is empty and was removed", left.room)));
        }
    }

    fn announce_leader(&mut self, room: &RoomName, change: &LeaderChange, actions: &mut Vec<ServerAction>) {
        if let LeaderChange::Elected(leader) = change {
            actions.push(ServerAction::BroadcastToRoom {
                room: room.clone(),
                line: ServerLine::leader(self.clock.tick(), leader.username.clone()),
                exclude: None,
            });
            actions.push(log(LogLevel::Info, format!("{} now leads room {room}", leader.username)));
        }
    }

    fn handle_delivery_failed(&mut self, connection: ConnectionId, reason: &str) -> Vec<ServerAction> {
        if !self.connections.contains_key(&connection) {
            return Vec::new();
        }

        let mut actions =
            vec![log(LogLevel::Warn, format!("write to connection {connection} failed, evicting: {reason}"))];
        actions.extend(self.close_connection(connection, reason));
        actions
    }

    /// Tear a connection down: leave its room, announce, deregister, close.
    ///
    /// Idempotent. Closing a connection the driver no longer knows produces
    /// no notices and no close action.
    fn close_connection(&mut self, connection: ConnectionId, reason: &str) -> Vec<ServerAction> {
        let Some(mut conn) = self.connections.remove(&connection) else {
            return vec![log(LogLevel::Debug, format!("connection {connection} already closed ({reason})"))];
        };
        let previous = conn.close();
        let now = self.env.now();
        let (age, idle) = (conn.age(now), conn.idle_for(now));

        let mut actions = Vec::new();
        let username = self.registry.lookup(connection).map(|session| session.username.clone());
        match username {
            Some(username) => {
                if let Some(left) = self.directory.leave(&mut self.registry, connection) {
                    self.announce_departure(connection, &username, left, &mut actions);
                }
                self.registry.remove(connection);
                actions.push(log(
                    LogLevel::Info,
                    format!("client {username} disconnected after {age:?}, idle {idle:?}: {reason}"),
                ));
            },
            None => {
                actions.push(log(
                    LogLevel::Debug,
                    format!(
                        "connection {connection} closed in state {previous:?} with {} bytes pending: {reason}",
                        conn.pending_bytes()
                    ),
                ));
            },
        }

        actions.push(ServerAction::CloseConnection { connection, reason: reason.to_string() });
        actions
    }

    /// Registered sessions.
    pub fn registry(&self) -> &ConnectionRegistry<E::Instant> {
        &self.registry
    }

    /// Rooms, members and leaders.
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Phase of an open connection. `None` once it is closed.
    pub fn connection_state(&self, connection: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&connection).map(Connection::state)
    }

    /// Number of open connections, registered or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Members of `room` other than `exclude`, snapshotted.
    pub fn room_recipients(&self, room: &str, exclude: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.directory
            .members_of(room)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&connection| Some(connection) != exclude)
            .collect()
    }

    /// Every registered connection other than `exclude`, snapshotted.
    pub fn all_recipients(&self, exclude: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.registry
            .all()
            .map(|(connection, _)| connection)
            .filter(|&connection| Some(connection) != exclude)
            .collect()
    }

    /// Last logical clock value stamped on a line.
    pub fn clock(&self) -> u64 {
        self.clock.current()
    }
}

impl<E: Environment> std::fmt::Debug for ServerDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.connections.len())
            .field("session_count", &self.registry.session_count())
            .field("room_count", &self.directory.room_count())
            .field("clock", &self.clock.current())
            .finish()
    }
}

fn reply(connection: ConnectionId, line: ServerLine) -> ServerAction {
    ServerAction::SendToConnection { connection, line }
}

fn log(level: LogLevel, message: String) -> ServerAction {
    ServerAction::Log { level, message }
}
