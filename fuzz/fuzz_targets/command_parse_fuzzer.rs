//! Fuzz target for client and server line parsing
//!
//! # Invariants
//!
//! - `Command::parse` and `ServerLine::parse` NEVER panic
//! - Blank lines are never commands
//! - A parsed command renders back to a line that parses to the same command
//! - A parsed server line renders to text that parses to the same line

#![no_main]

use hearth_proto::{Command, ServerLine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    match Command::parse(line) {
        None => assert!(line.trim().is_empty()),
        Some(command) => assert_eq!(Command::parse(&command.to_string()), Some(command)),
    }

    let parsed = ServerLine::parse(line);
    assert_eq!(ServerLine::parse(&parsed.to_string()), parsed);
});
