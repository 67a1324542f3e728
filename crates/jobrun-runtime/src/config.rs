//! Scheduler timing configuration.

use std::time::Duration;

/// Default delay between prerequisite checks (seconds).
pub const DEFAULT_WAIT_SECS: u64 = 5;
/// Default delay between task polls (seconds).
pub const DEFAULT_POLL_SECS: u64 = 3;

/// Fixed intervals a job sleeps between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    /// Delay between prerequisite checks.
    pub wait: Duration,

    /// Delay between task polls.
    pub poll: Duration,

    /// Upper bound on a job's run. `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            poll: Duration::from_secs(DEFAULT_POLL_SECS),
            deadline: None,
        }
    }
}

impl Intervals {
    /// Builder method to set the prerequisite wait interval.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Builder method to set the poll interval.
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Builder method to bound each job's run.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let intervals = Intervals::default();
        assert_eq!(intervals.wait, Duration::from_secs(5));
        assert_eq!(intervals.poll, Duration::from_secs(3));
        assert!(intervals.deadline.is_none());
    }
}
