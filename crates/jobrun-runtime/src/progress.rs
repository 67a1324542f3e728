//! Progress reporting for running tasks.

use tracing::debug;

/// Receives progress increments as tasks are polled.
///
/// `delta` is the increase since the previous observation, in `[0, 1]`.
/// It is never negative: progress only moves forward.
pub trait ProgressObserver: Send + Sync {
    fn advance(&self, task: &str, delta: f64);
}

/// Observer that logs each increment as a percentage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn advance(&self, task: &str, delta: f64) {
        debug!(task = %task, delta_pct = delta * 100.0, "Task progress");
    }
}
