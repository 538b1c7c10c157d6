//! Operations for model-based testing.

use arbitrary::Arbitrary;

/// Index of a simulated client. Reduced modulo the number of clients.
pub type ClientSlot = u8;

/// Rooms operations pick from. The blank name exercises the usage reply.
pub const ROOM_NAMES: [&str; 4] = ["lobby", "dev", "ops", " "];

/// Something a client does.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Connect and register. No-op when the slot is already connected.
    Login {
        /// Client connecting.
        client: ClientSlot,
    },

    /// `/join` one of [`ROOM_NAMES`].
    Join {
        /// Client joining.
        client: ClientSlot,
        /// Index into [`ROOM_NAMES`], reduced modulo its length.
        room: u8,
    },

    /// Plain chat text.
    Chat {
        /// Sender.
        client: ClientSlot,
        /// Makes the text unique within a run.
        seed: u16,
    },

    /// A command that only reads state.
    Query {
        /// Client asking.
        client: ClientSlot,
        /// Which command.
        kind: QueryKind,
    },

    /// `/quit`.
    Quit {
        /// Client leaving.
        client: ClientSlot,
    },

    /// The peer drops the TCP connection.
    HangUp {
        /// Client disappearing.
        client: ClientSlot,
    },

    /// The client's socket stops accepting writes, then the client asks
    /// `/users`, so the reply fails and the client is evicted.
    BreakWrites {
        /// Client whose writes fail.
        client: ClientSlot,
    },

    /// Bytes that are not UTF-8. The server drops the connection.
    Garbage {
        /// Client sending them.
        client: ClientSlot,
    },

    /// Move simulated time forward.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

/// Read-only commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum QueryKind {
    /// `/users`
    Users,
    /// `/room`
    Room,
    /// `/leader`
    Leader,
    /// A slash command the server does not know.
    Unknown,
}

impl QueryKind {
    /// The line a client types.
    pub fn line(self) -> &'static str {
        match self {
            Self::Users => "/users",
            Self::Room => "/room",
            Self::Leader => "/leader",
            Self::Unknown => "/dance",
        }
    }
}

impl Operation {
    /// Client the operation acts for, if any.
    pub fn client(&self) -> Option<ClientSlot> {
        match self {
            Self::Login { client }
            | Self::Join { client, .. }
            | Self::Chat { client, .. }
            | Self::Query { client, .. }
            | Self::Quit { client }
            | Self::HangUp { client }
            | Self::BreakWrites { client }
            | Self::Garbage { client } => Some(*client),
            Self::AdvanceTime { .. } => None,
        }
    }

    /// Whether the operation ends the client's connection.
    pub fn disconnects(&self) -> bool {
        matches!(
            self,
            Self::Quit { .. } | Self::HangUp { .. } | Self::BreakWrites { .. } | Self::Garbage { .. }
        )
    }
}
