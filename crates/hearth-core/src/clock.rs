//! Logical clock stamped on structured server lines.

/// Server-wide logical clock.
///
/// Every structured line the server emits takes the next value, so clients
/// can order notices and messages without trusting wall time. The first value
/// handed out is 1.
#[derive(Debug, Default, Clone)]
pub struct LogicalClock {
    current: u64,
}

impl LogicalClock {
    /// A clock that has handed out nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the new value.
    pub fn tick(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Last value handed out, 0 before the first tick.
    pub fn current(&self) -> u64 {
        self.current
    }
}
