//! Identifier and time types shared across the simulator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time, in abstract device-cycle units.
///
/// Time is continuous for latency accounting but the scheduler groups
/// events into integer buckets; see [`tick_of`].
pub type SimTime = f64;

/// The integer bucket a timestamp falls into.
///
/// All events sharing a bucket are treated as concurrent by the dispatch
/// loop and ordered only by scheduling policy.
pub fn tick_of(time: SimTime) -> i64 {
    time.floor() as i64
}

/// Identifies a logical operation.
///
/// All sub-events of one operation share the same `OpId`; the dependency
/// store and the LBA lock table are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId(pub u64);

/// Identifies a single event.
///
/// Sub-events synthesized from a parent (the transfer half of a read, the
/// replacement write of a failed copy-back) share the parent's id; fresh
/// ids come from whoever constructs the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// A logical block address, the unit of addressable user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lba(pub u64);

impl From<EventId> for OpId {
    fn from(id: EventId) -> Self {
        OpId(id.0)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op:{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ev:{}", self.0)
    }
}

impl fmt::Display for Lba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lba:{}", self.0)
    }
}
