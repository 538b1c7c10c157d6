//! Environment abstraction for deterministic testing.
//!
//! Decouples relay logic from the system clocks. Production reads real time;
//! the simulation harness uses a clock that only moves when a test advances
//! it.

use std::{fmt::Debug, ops::Sub, time::Duration};

/// Source of time for the relay.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    ///
    /// Registration order is decided by comparing these, so two sessions
    /// registered one after the other must never compare in reverse.
    type Instant: Copy + Ord + Debug + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Seconds since the Unix epoch. Display only; never used for ordering.
    fn wall_clock_secs(&self) -> u64;
}
