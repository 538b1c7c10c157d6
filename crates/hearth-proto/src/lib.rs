//! Hearth wire protocol.
//!
//! Plain UTF-8 text, one message per line, each line terminated by a single
//! line feed. There is no length prefix and no binary framing.
//!
//! - [`LineDecoder`]: byte stream → complete lines
//! - [`Command`]: client → server lines
//! - [`ServerLine`]: server → client lines (`SYS`, `MSG`, `LEADER`, plain text)
//! - [`WallClock`]: the `HH:MM:SS` stamp carried by chat lines

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod command;
pub mod decoder;
pub mod errors;
pub mod line;

pub use clock::WallClock;
pub use command::Command;
pub use decoder::LineDecoder;
pub use errors::{ProtocolError, Result};
pub use line::ServerLine;

/// The only delimiter the protocol knows.
pub const LINE_TERMINATOR: u8 = b'\n';
