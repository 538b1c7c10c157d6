//! Simulated environment.
//!
//! Time stands still until a test advances it. Clones share the same clock,
//! so a test can keep a handle and move time under a running driver.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use hearth_core::Environment;

/// 2024-01-01 12:00:00 UTC.
pub const DEFAULT_WALL_CLOCK_SECS: u64 = 1_704_110_400;

/// Manually advanced clock.
///
/// Instants are the time elapsed since the environment was created.
#[derive(Debug, Clone)]
pub struct SimEnv {
    elapsed_micros: Arc<AtomicU64>,
    wall_origin_secs: u64,
}

impl SimEnv {
    /// Clock at zero, wall clock at [`DEFAULT_WALL_CLOCK_SECS`].
    pub fn new() -> Self {
        Self::with_wall_clock(DEFAULT_WALL_CLOCK_SECS)
    }

    /// Clock at zero, wall clock at `unix_secs`.
    pub fn with_wall_clock(unix_secs: u64) -> Self {
        Self { elapsed_micros: Arc::new(AtomicU64::new(0)), wall_origin_secs: unix_secs }
    }

    /// Move time forward for every clone of this environment.
    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Self::Instant {
        self.elapsed()
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_origin_secs + self.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        env.advance(Duration::from_millis(1500));

        assert_eq!(other.now(), Duration::from_millis(1500));
        assert_eq!(other.wall_clock_secs(), DEFAULT_WALL_CLOCK_SECS + 1);
    }

    #[test]
    fn time_stands_still() {
        let env = SimEnv::with_wall_clock(0);
        assert_eq!(env.now(), env.now());
        assert_eq!(env.wall_clock_secs(), 0);
    }
}
