//! Counters the scheduler maintains about its own behavior.

use serde::Serialize;

/// Scheduling statistics for one run.
///
/// These are the scheduler's own counters; per-device and per-workload
/// statistics belong to the collaborators that observe completions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    /// Writes (or their whole chains) cancelled because a later arrival
    /// superseded them.
    pub num_write_cancellations: u64,
    /// Events successfully issued to the device.
    pub events_dispatched: u64,
    /// Cancelled operations drained through the noop path.
    pub noops_completed: u64,
    /// Largest number of admitted events observed at the start of a tick.
    pub max_queue_depth: usize,
}

impl SchedulerStats {
    pub(crate) fn sample_queue_depth(&mut self, depth: usize) {
        self.max_queue_depth = self.max_queue_depth.max(depth);
    }
}
