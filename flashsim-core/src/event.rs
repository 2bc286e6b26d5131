//! The event model: one sub-operation at one simulated time.

use crate::{EventId, Lba, OpId, PhysicalAddress, SimTime};

/// The kind of work a single event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Virtual: rewritten on admission into a `ReadCommand` followed by a
    /// dependent `ReadTransfer`.
    Read,
    /// The command phase of a read; occupies the die.
    ReadCommand,
    /// The transfer phase of a read; drains the die register over the bus.
    ReadTransfer,
    /// A page program.
    Write,
    /// An on-die move with a pre-reserved destination page.
    CopyBack,
    /// A block erase.
    Erase,
    /// Invalidation of a logical address.
    Trim,
    /// A request for the block manager to produce migrations.
    GarbageCollection,
}

impl EventKind {
    /// Whether this kind belongs to the read family (virtual or phased).
    pub fn is_read(self) -> bool {
        matches!(
            self,
            EventKind::Read | EventKind::ReadCommand | EventKind::ReadTransfer
        )
    }
}

/// Candidate state for a read that may be satisfied from several replicas.
///
/// The block manager picks a (package, die) pair; the table resolves it to
/// the logical address served there. A candidate that turned out to be
/// locked can be withdrawn so the next choice lands elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexibleRead {
    candidates: Vec<Vec<Option<Lba>>>,
    commenced: bool,
}

impl FlexibleRead {
    /// Build the payload from a candidate table indexed `[package][die]`.
    pub fn new(candidates: Vec<Vec<Option<Lba>>>) -> Self {
        Self {
            candidates,
            commenced: false,
        }
    }

    /// The logical address served by the replica at (package, die), if any.
    pub fn lba_at(&self, package: u32, die: u32) -> Option<Lba> {
        self.candidates
            .get(package as usize)
            .and_then(|dies| dies.get(die as usize))
            .copied()
            .flatten()
    }

    /// Withdraw the candidate at (package, die) so the block manager's next
    /// choice differs. Called when the candidate's LBA is locked.
    pub fn find_alternative_immediate_candidate(&mut self, package: u32, die: u32) {
        if let Some(slot) = self
            .candidates
            .get_mut(package as usize)
            .and_then(|dies| dies.get_mut(die as usize))
        {
            *slot = None;
        }
    }

    /// True once the read has been bound to a concrete replica.
    pub fn has_commenced(&self) -> bool {
        self.commenced
    }

    /// Mark the read as bound to its chosen replica.
    pub fn register_read_commencement(&mut self) {
        self.commenced = true;
    }

    /// True if any candidate remains selectable.
    pub fn has_candidates(&self) -> bool {
        self.candidates
            .iter()
            .any(|dies| dies.iter().any(Option::is_some))
    }
}

/// One sub-operation of a logical request.
///
/// Events move by value through the scheduler's queues: the future bag, the
/// time-bucketed current map, a dependency queue, or in flight through the
/// device. Exactly one of these owns an event at any moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    op_id: OpId,
    event_id: EventId,
    lba: Lba,
    physical: Option<PhysicalAddress>,
    replace: Option<PhysicalAddress>,
    kind: EventKind,
    current_time: SimTime,
    bus_wait_time: f64,
    accumulated_wait_time: f64,
    garbage_collection: bool,
    mapping_op: bool,
    original_application_io: bool,
    noop: bool,
    flex: Option<FlexibleRead>,
}

impl Event {
    /// Create an event. The operation id defaults to the event id; callers
    /// assembling multi-event operations override it with [`set_op_id`].
    ///
    /// [`set_op_id`]: Event::set_op_id
    pub fn new(kind: EventKind, lba: Lba, event_id: EventId, current_time: SimTime) -> Self {
        Self {
            op_id: OpId::from(event_id),
            event_id,
            lba,
            physical: None,
            replace: None,
            kind,
            current_time,
            bus_wait_time: 0.0,
            accumulated_wait_time: 0.0,
            garbage_collection: false,
            mapping_op: false,
            original_application_io: false,
            noop: false,
            flex: None,
        }
    }

    /// Create a flexible read over the given candidate table.
    pub fn flexible_read(
        candidates: Vec<Vec<Option<Lba>>>,
        event_id: EventId,
        current_time: SimTime,
    ) -> Self {
        let mut event = Self::new(EventKind::Read, Lba(0), event_id, current_time);
        event.flex = Some(FlexibleRead::new(candidates));
        event
    }

    /// The id of the enclosing logical operation.
    pub fn op_id(&self) -> OpId {
        self.op_id
    }

    /// Re-home the event under a different operation.
    pub fn set_op_id(&mut self, op_id: OpId) {
        self.op_id = op_id;
    }

    /// This event's identity.
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// The logical address this event targets.
    pub fn lba(&self) -> Lba {
        self.lba
    }

    /// Re-target the event (flexible-read resolution, mapping updates).
    pub fn set_lba(&mut self, lba: Lba) {
        self.lba = lba;
    }

    /// The assigned physical address, if placement has happened.
    pub fn physical(&self) -> Option<PhysicalAddress> {
        self.physical
    }

    /// Assign the physical address.
    pub fn set_physical(&mut self, address: PhysicalAddress) {
        self.physical = Some(address);
    }

    /// The address being replaced (previous mapping), if known.
    pub fn replace(&self) -> Option<PhysicalAddress> {
        self.replace
    }

    /// Record the address being replaced.
    pub fn set_replace(&mut self, address: PhysicalAddress) {
        self.replace = Some(address);
    }

    /// The kind of work this event represents.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Rewrite the kind (read decomposition, copy-back transformation).
    pub fn set_kind(&mut self, kind: EventKind) {
        self.kind = kind;
    }

    /// The event's own clock: when it is due.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Time spent waiting for the bus/die since admission.
    pub fn bus_wait_time(&self) -> f64 {
        self.bus_wait_time
    }

    /// Time inherited from predecessors in the dependency chain.
    pub fn accumulated_wait_time(&self) -> f64 {
        self.accumulated_wait_time
    }

    /// Total time this event (and its chain) has waited.
    pub fn overall_wait_time(&self) -> f64 {
        self.bus_wait_time + self.accumulated_wait_time
    }

    /// Suspend the event: charge bus wait and move its clock forward so it
    /// lands in a later bucket when re-pushed.
    pub fn incr_bus_wait(&mut self, wait: f64) {
        self.bus_wait_time += wait;
        self.current_time += wait;
    }

    /// Credit wait inherited from a completed predecessor, advancing the
    /// clock to the predecessor's completion time.
    pub fn incr_accumulated_wait(&mut self, wait: f64) {
        self.accumulated_wait_time += wait;
        self.current_time += wait;
    }

    /// Advance the clock by device service time. Unlike the wait methods
    /// this charges no wait counter; the device calls it while executing
    /// the event.
    pub fn incr_time(&mut self, delta: f64) {
        self.current_time += delta;
    }

    /// Whether this event is part of a garbage-collection migration.
    pub fn is_garbage_collection(&self) -> bool {
        self.garbage_collection
    }

    /// Flag (or unflag) the event as garbage collection.
    pub fn set_garbage_collection(&mut self, gc: bool) {
        self.garbage_collection = gc;
    }

    /// Whether this event reads or writes FTL mapping pages.
    pub fn is_mapping_op(&self) -> bool {
        self.mapping_op
    }

    /// Flag the event as a mapping operation.
    pub fn set_mapping_op(&mut self, mapping: bool) {
        self.mapping_op = mapping;
    }

    /// Whether the enclosing operation came straight from the application.
    pub fn is_original_application_io(&self) -> bool {
        self.original_application_io
    }

    /// Flag the event as original application I/O.
    pub fn set_original_application_io(&mut self, original: bool) {
        self.original_application_io = original;
    }

    /// Whether the event has been cancelled and only completes bookkeeping.
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Mark the event cancelled.
    pub fn set_noop(&mut self, noop: bool) {
        self.noop = noop;
    }

    /// Whether this event may be served from any of several replicas.
    pub fn is_flexible_read(&self) -> bool {
        self.flex.is_some()
    }

    /// The flexible-read payload, if this is a flexible read.
    pub fn flex(&self) -> Option<&FlexibleRead> {
        self.flex.as_ref()
    }

    /// Mutable access to the flexible-read payload.
    pub fn flex_mut(&mut self) -> Option<&mut FlexibleRead> {
        self.flex.as_mut()
    }

    /// Derive the transfer half of a read from its command half.
    ///
    /// The transfer shares the command's identity and timing but is an
    /// ordinary event: replica selection happens once, on the command.
    pub fn derive_transfer(&self) -> Event {
        let mut transfer = self.clone();
        transfer.kind = EventKind::ReadTransfer;
        transfer.flex = None;
        transfer
    }
}
