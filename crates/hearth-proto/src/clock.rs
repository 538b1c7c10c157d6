//! Wall-clock stamp for chat lines.

use std::fmt;

const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_MINUTE: u64 = 60;

/// Time of day in UTC, rendered `HH:MM:SS`.
///
/// Display only. Ordering between lines comes from the logical clock, never
/// from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallClock {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

impl WallClock {
    /// Time of day of a Unix timestamp.
    pub fn from_unix_secs(secs: u64) -> Self {
        let of_day = secs % SECS_PER_DAY;
        Self {
            hours: (of_day / SECS_PER_HOUR) as u8,
            minutes: (of_day % SECS_PER_HOUR / SECS_PER_MINUTE) as u8,
            seconds: (of_day % SECS_PER_MINUTE) as u8,
        }
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
