//! Physical flash addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical flash location: (package, die, plane, block, page).
///
/// Addresses are assigned by the block manager at dispatch time; an event
/// that has not been placed yet carries `None` instead of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalAddress {
    /// Package (channel) index.
    pub package: u32,
    /// Die index within the package.
    pub die: u32,
    /// Plane index within the die.
    pub plane: u32,
    /// Block index within the plane.
    pub block: u32,
    /// Page index within the block. Bounded by `SchedulerConfig::block_size`.
    pub page: u32,
}

impl PhysicalAddress {
    /// Create an address from its five coordinates.
    pub const fn new(package: u32, die: u32, plane: u32, block: u32, page: u32) -> Self {
        Self {
            package,
            die,
            plane,
            block,
            page,
        }
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.package, self.die, self.plane, self.block, self.page
        )
    }
}
