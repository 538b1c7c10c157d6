//! Production environment backed by the system clocks.
//!
//! Monotonic time comes from `std::time::Instant`, wall time from
//! `SystemTime`. Nothing here is reproducible; simulations use the harness
//! environment instead.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use hearth_core::Environment;

/// Production environment using system time.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    /// A clock set before 1970 reads as the epoch.
    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn wall_clock_is_after_2024() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_704_067_200);
    }
}
