//! Client → server commands.
//!
//! After registration every non-blank line a client sends is one command.
//! Slash commands are matched on their first whitespace-separated token,
//! exactly and case-sensitively. Lines that do not start with `/` are chat.
//!
//! | Line | Command |
//! |------|---------|
//! | `/users` | [`Command::ListUsers`] |
//! | `/room` | [`Command::WhoAmI`] |
//! | `/join <room>` | [`Command::Join`] |
//! | `/leader` | [`Command::WhoIsLeader`] |
//! | `QUIT`, `exit`, `/quit` | [`Command::Quit`] |
//! | `/anything-else ...` | [`Command::Unknown`] |
//! | anything else | [`Command::ChatText`] |

use std::fmt;

/// Whole lines that end the session.
pub const QUIT_KEYWORDS: [&str; 2] = ["QUIT", "exit"];

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every registered username
    ListUsers,
    /// Report the sender's current room
    WhoAmI,
    /// Move to a room, creating it if needed.
    ///
    /// The name is trimmed and may be empty here; the room directory rejects
    /// empty names.
    Join(String),
    /// Report the leader of the sender's room
    WhoIsLeader,
    /// Graceful disconnect
    Quit,
    /// A chat message for the sender's room
    ChatText(String),
    /// A slash command nobody recognizes, kept verbatim
    Unknown(String),
}

impl Command {
    /// Parse one line. Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if QUIT_KEYWORDS.contains(&line) {
            return Some(Self::Quit);
        }
        if !line.starts_with('/') {
            return Some(Self::ChatText(line.to_owned()));
        }

        let (token, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = match token {
            "/users" => Self::ListUsers,
            "/room" => Self::WhoAmI,
            "/join" => Self::Join(rest.trim().to_owned()),
            "/leader" => Self::WhoIsLeader,
            "/quit" => Self::Quit,
            _ => Self::Unknown(line.to_owned()),
        };
        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListUsers => f.write_str("/users"),
            Self::WhoAmI => f.write_str("/room"),
            Self::Join(room) if room.is_empty() => f.write_str("/join"),
            Self::Join(room) => write!(f, "/join {room}"),
            Self::WhoIsLeader => f.write_str("/leader"),
            Self::Quit => f.write_str("QUIT"),
            Self::ChatText(text) | Self::Unknown(text) => f.write_str(text),
        }
    }
}
