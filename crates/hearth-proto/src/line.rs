//! Server → client lines.
//!
//! Structured lines carry a tag and the server's logical clock:
//!
//! ```text
//! SYS <clock> <text>
//! MSG <clock> <HH:MM:SS> <sender> <text>
//! LEADER <clock> <username>
//! ```
//!
//! The last field is free-form and may contain spaces. Replies to `/users`,
//! the welcome banner, and error messages are plain text with no tag.

use std::fmt;

use bytes::Bytes;

use crate::{LINE_TERMINATOR, WallClock};

/// Tag of system notices.
pub const SYS_TAG: &str = "SYS";

/// Tag of chat messages.
pub const MSG_TAG: &str = "MSG";

/// Tag of leader announcements.
pub const LEADER_TAG: &str = "LEADER";

/// A structured line splits into at most this many space-separated fields.
pub const MAX_FIELDS: usize = 5;

/// One line sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// System notice
    System {
        /// Logical clock
        clock: u64,
        /// Notice text
        text: String,
    },
    /// Chat message relayed to a room
    Chat {
        /// Logical clock
        clock: u64,
        /// `HH:MM:SS` at which the server relayed it
        wall_clock: String,
        /// Sender's username
        sender: String,
        /// Message text
        text: String,
    },
    /// Leader of the recipient's room
    LeaderAnnounce {
        /// Logical clock
        clock: u64,
        /// Leader's username
        leader: String,
    },
    /// Untagged text
    Raw(String),
}

impl ServerLine {
    /// System notice.
    pub fn system(clock: u64, text: impl Into<String>) -> Self {
        Self::System { clock, text: text.into() }
    }

    /// Chat message stamped with `wall_clock`.
    pub fn chat(
        clock: u64,
        wall_clock: WallClock,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::Chat { clock, wall_clock: wall_clock.to_string(), sender: sender.into(), text: text.into() }
    }

    /// Leader announcement.
    pub fn leader(clock: u64, leader: impl Into<String>) -> Self {
        Self::LeaderAnnounce { clock, leader: leader.into() }
    }

    /// Untagged text.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    /// Logical clock of a structured line.
    pub fn clock(&self) -> Option<u64> {
        match self {
            Self::System { clock, .. } | Self::Chat { clock, .. } | Self::LeaderAnnounce { clock, .. } => {
                Some(*clock)
            },
            Self::Raw(_) => None,
        }
    }

    /// The free-form part of the line: notice or message text, the leader's
    /// name, or the whole raw line.
    pub fn text(&self) -> &str {
        match self {
            Self::System { text, .. } | Self::Chat { text, .. } | Self::Raw(text) => text,
            Self::LeaderAnnounce { leader, .. } => leader,
        }
    }

    /// Wire form including the terminator.
    pub fn encode(&self) -> Bytes {
        let mut line = self.to_string();
        line.push(char::from(LINE_TERMINATOR));
        Bytes::from(line)
    }

    /// Parse one line as a client would, without its terminator.
    ///
    /// Unknown tags, a clock that is not a number, or too few fields all fall
    /// back to [`ServerLine::Raw`]. Never fails.
    pub fn parse(line: &str) -> Self {
        let fields: Vec<&str> = line.splitn(MAX_FIELDS, ' ').collect();
        let parsed = match fields.as_slice() {
            [SYS_TAG, clock, text @ ..] if !text.is_empty() => {
                clock.parse().ok().map(|clock| Self::System { clock, text: text.join(" ") })
            },
            [MSG_TAG, clock, wall_clock, sender, text] => clock.parse().ok().map(|clock| Self::Chat {
                clock,
                wall_clock: (*wall_clock).to_owned(),
                sender: (*sender).to_owned(),
                text: (*text).to_owned(),
            }),
            [LEADER_TAG, clock, leader @ ..] if !leader.is_empty() => {
                clock.parse().ok().map(|clock| Self::LeaderAnnounce { clock, leader: leader.join(" ") })
            },
            _ => None,
        };
        parsed.unwrap_or_else(|| Self::Raw(line.to_owned()))
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System { clock, text } => write!(f, "{SYS_TAG} {clock} {text}"),
            Self::Chat { clock, wall_clock, sender, text } => {
                write!(f, "{MSG_TAG} {clock} {wall_clock} {sender} {text}")
            },
            Self::LeaderAnnounce { clock, leader } => write!(f, "{LEADER_TAG} {clock} {leader}"),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_tagged_lines() {
        let line = ServerLine::system(5, "alice joined the room");
        assert_eq!(&line.encode()[..], b"SYS 5 alice joined the room\n");

        let line = ServerLine::chat(6, WallClock::from_unix_secs(45_296), "bob", "hi there");
        assert_eq!(&line.encode()[..], b"MSG 6 12:34:56 bob hi there\n");

        let line = ServerLine::leader(7, "alice");
        assert_eq!(&line.encode()[..], b"LEADER 7 alice\n");

        assert_eq!(&ServerLine::raw("Users: a, b").encode()[..], b"Users: a, b\n");
    }

    #[test]
    fn parses_message_text_with_spaces() {
        let line = ServerLine::parse("MSG 12 09:15:00 carol see you  at noon");
        assert_eq!(line, ServerLine::Chat {
            clock: 12,
            wall_clock: "09:15:00".into(),
            sender: "carol".into(),
            text: "see you  at noon".into(),
        });
    }

    #[test]
    fn parses_system_text_with_many_words() {
        let line = ServerLine::parse("SYS 3 alice left the room lobby");
        assert_eq!(line, ServerLine::system(3, "alice left the room lobby"));
    }

    #[test]
    fn malformed_lines_fall_back_to_raw() {
        for text in ["Welcome to the chat server!", "SYS x hello", "SYS 3", "MSG 1 10:00:00 bob", "LEADER 2", ""] {
            assert_eq!(ServerLine::parse(text), ServerLine::raw(text), "{text:?}");
        }
    }

    #[test]
    fn accessors() {
        let line = ServerLine::leader(9, "bob");
        assert_eq!(line.clock(), Some(9));
        assert_eq!(line.text(), "bob");
        assert_eq!(ServerLine::raw("Unknown command").clock(), None);
    }
}
