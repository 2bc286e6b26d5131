//! Run configuration for the scheduler.

use serde::{Deserialize, Serialize};

/// Minimum bus-wait penalty charged when a die is busy.
pub const DEFAULT_WAIT_TIME: f64 = 3.0;

/// Which block-manager strategy the run is assembled with.
///
/// The scheduler itself only talks to the [`BlockManager`] trait; the
/// embedding simulator constructs the concrete strategy this id names and
/// hands it in at scheduler construction.
///
/// [`BlockManager`]: crate::BlockManager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockManagerId {
    /// Stripe writes across all dies.
    #[default]
    Parallel,
    /// Shortest-queue placement with hot/cold separation.
    ShortestQueueHotCold,
    /// Wear-aware placement.
    Wearwolf,
    /// Wear-aware placement with locality grouping.
    WearwolfLocality,
    /// Round-robin die selection.
    RoundRobin,
}

/// Dispatch-order policy applied within each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingScheme {
    /// Application I/O first: read commands, read transfers, writes, then
    /// GC writes and erases. Flexible reads ride with read commands.
    #[default]
    ApplicationPriority,
    /// Garbage collection first: erases and GC writes ahead of user I/O.
    GcPriority,
    /// Equal priority, interleaved: user and GC writes unified, transfers
    /// and copy-backs unified.
    InterleavedEqual,
    /// As interleaved, but flexible reads share the writes' priority.
    FlexReadEqualsWrite,
}

/// Configuration of one scheduler instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Block-manager strategy the run was assembled with.
    pub block_manager: BlockManagerId,
    /// Dispatch-order policy.
    pub scheme: SchedulingScheme,
    /// Minimum bus-wait penalty when a die is busy.
    pub wait_time: f64,
    /// Pages per block; chosen page indices must stay below this.
    pub block_size: u32,
    /// Seed for the tie-breaking shuffle of same-timestamp events.
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            block_manager: BlockManagerId::default(),
            scheme: SchedulingScheme::default(),
            wait_time: DEFAULT_WAIT_TIME,
            block_size: 128,
            seed: 42,
        }
    }
}

impl SchedulerConfig {
    /// The default configuration with a specific shuffle seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// The default configuration with a specific dispatch policy.
    pub fn with_scheme(scheme: SchedulingScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }
}
