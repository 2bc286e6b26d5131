//! Contracts the scheduler consumes from its collaborators.
//!
//! The scheduler never reads collaborator state directly: die busy times
//! and registers belong to the block manager, the logical-to-physical map
//! belongs to the FTL, and channel timing belongs to the device. Each is
//! queried or notified through the traits below.

use crate::{Event, EventKind, OpId, PhysicalAddress, SimTime};
use std::collections::VecDeque;

/// Result of issuing an event to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The event executed; its clock has been advanced by the modeled
    /// latency.
    Success,
    /// The event could not execute. The scheduler aborts the run.
    Failure,
}

/// One garbage-collection migration: an ordered chain beginning with a
/// read and ending with a write (or copy-back pair), all sharing an
/// operation id fresh to the scheduler.
pub type MigrationQueue = VecDeque<Event>;

/// Physical-address allocation and device-busy accounting.
///
/// One strategy instance is owned by the scheduler for the lifetime of a
/// run; which strategy gets built is named by
/// [`BlockManagerId`](crate::BlockManagerId) in the run configuration.
pub trait BlockManager {
    /// Choose a destination page for a write or copy-back, or `None` when
    /// no slot is currently available.
    fn choose_write_address(&mut self, event: &Event) -> Option<PhysicalAddress>;

    /// Choose among a flexible read's candidate replicas, preferring idle
    /// dies. `None` when no candidate remains selectable.
    fn choose_flexible_read_address(&mut self, event: &Event) -> Option<PhysicalAddress>;

    /// How long until the die behind `address` can accept work. Zero means
    /// the event can be scheduled now.
    fn in_how_long_can_this_event_be_scheduled(
        &self,
        address: PhysicalAddress,
        now: SimTime,
    ) -> SimTime;

    /// Whether the die behind `address` can take an event of this kind for
    /// this operation (register availability, ordering constraints).
    fn can_schedule_on_die(&self, address: PhysicalAddress, kind: EventKind, op_id: OpId) -> bool;

    /// Produce the migrations a garbage-collection request translates to.
    fn migrate(&mut self, event: &Event) -> Vec<MigrationQueue>;

    /// A write entered the scheduler (admission, before placement).
    fn register_write_arrival(&mut self, _event: &Event) {}

    /// A write or copy-back finished on the device.
    fn register_write_outcome(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// An erase finished on the device.
    fn register_erase_outcome(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// A read command finished on the device.
    fn register_read_command_outcome(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// A read transfer finished on the device.
    fn register_read_transfer_outcome(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// A cancelled transfer or copy-back released its die register.
    fn register_register_cleared(&mut self) {}

    /// A trim made a pending garbage-collection migration redundant.
    fn register_trim_making_gc_redundant(&mut self) {}

    /// A trim finished; the named address range is invalid now.
    fn trim(&mut self, _event: &Event) {}
}

/// The flash translation layer: owns the logical-to-physical map.
pub trait Ftl {
    /// Resolve the event's logical address to the physical page holding it.
    fn set_read_address(&mut self, event: &mut Event);

    /// Record the physical page the event's logical address currently maps
    /// to, as the event's replace address.
    fn set_replace_address(&mut self, event: &mut Event);

    /// A write or copy-back completed; update the map.
    fn register_write_completion(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// A read transfer completed.
    fn register_read_completion(&mut self, _event: &Event, _outcome: IssueOutcome) {}

    /// A trim completed; drop the mapping.
    fn register_trim_completion(&mut self, _event: &Event) {}
}

/// The device model: executes sub-operations and receives released events.
pub trait Device {
    /// Execute the event. On success the device advances the event's clock
    /// by the modeled latency; the scheduler reads it back as the
    /// completion time.
    fn issue(&mut self, event: &mut Event) -> IssueOutcome;

    /// Take ownership of a finished (or cancelled) event. This is the last
    /// the scheduler sees of it.
    fn register_event_completion(&mut self, event: Event);

    /// Release the die register a cancelled transfer or copy-back had
    /// reserved at `address`.
    fn clear_register(&mut self, _address: PhysicalAddress) {}
}
